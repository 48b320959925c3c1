//! Schema Name Analysis
//!
//! Decomposes generated schema identifiers such as `GetAllUsersResponseDto` or
//! `BulkDeleteHostsRequest` into an entity, the kind of action that produced
//! the name and whether the schema describes a collection. Rules are tried in
//! order, most specific first; the first match wins.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Substrings marking a collection-producing operation
pub const COLLECTION_INDICATORS: &[&str] = &["GetAll", "FindAll", "List", "Bulk"];

/// Verbs stripped by the fallback when no rule matches
const FALLBACK_VERBS: &[&str] = &["Get", "Create", "Update", "Delete", "Find", "Fetch"];

/// Minimum entity length before a trailing plural `s` is dropped
const PLURAL_MIN_LEN: usize = 3;

// =============================================================================
// Types
// =============================================================================

/// How an entity was recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Literal authentication operation name
    Auth,
    /// A verb/relational naming rule
    Crud,
    /// Fallback verb stripping
    Unknown,
}

/// Payload direction signalled by a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeSuffix {
    Response,
    Request,
}

/// Result of decomposing one schema name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    pub entity: String,
    pub action: ActionKind,
    pub is_collection: bool,
}

/// Aggregate view of a group of schema names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupAnalysis {
    /// Most frequent entity (shortest on ties, then first seen)
    pub entity: String,
    /// Some name signals Response and none signals Request
    pub is_response: bool,
    /// Some name signals Request and none signals Response
    pub is_request: bool,
    /// Both directions present
    pub is_mixed: bool,
    /// Any member is a collection
    pub is_collection: bool,
    pub actions: BTreeSet<ActionKind>,
    pub all_entities: BTreeSet<String>,
}

// =============================================================================
// Rules
// =============================================================================

enum RuleKind {
    /// Capture group 1 is the entity
    Capture,
    /// Literal auth operations, entity is fixed
    Auth,
}

struct EntityRule {
    pattern: Regex,
    kind: RuleKind,
}

fn rule(pattern: &str, kind: RuleKind) -> EntityRule {
    EntityRule {
        pattern: Regex::new(pattern).expect("entity rule patterns are valid"),
        kind,
    }
}

static ENTITY_RULES: LazyLock<Vec<EntityRule>> = LazyLock::new(|| {
    use RuleKind::{Auth, Capture};
    vec![
        rule(r"^Get(\w+?)By\w+$", Capture),
        rule(r"^GetOne(\w+)$", Capture),
        rule(r"^GetAll(\w+?)s?$", Capture),
        rule(r"^Create(\w+)$", Capture),
        rule(r"^Update(\w+)$", Capture),
        rule(r"^Delete(\w+)$", Capture),
        rule(r"^Disable(\w+)$", Capture),
        rule(r"^Enable(\w+)$", Capture),
        rule(r"^Reset(\w+?)(?:Traffic|Data|State)$", Capture),
        rule(r"^Revoke(\w+?)Subscription$", Capture),
        rule(r"^Restart(\w+)$", Capture),
        rule(r"^Bulk(?:All)?(?:Delete|Update|Reset|Revoke|Enable|Disable)(\w+?)s?$", Capture),
        rule(r"^(?:Add|Remove)\w+To(\w+)$", Capture),
        rule(r"^(?:Add|Remove)\w+From(\w+)$", Capture),
        rule(r"^Reorder(\w+?)s?$", Capture),
        rule(r"^Set\w+ToMany(\w+?)s?$", Capture),
        rule(r"^Verify(\w+?)(?:Authentication|Registration)$", Capture),
        rule(r"^Get(\w+?)(?:Authentication|Registration)Options$", Capture),
        rule(r"^(Login|Register|OAuth2Callback|TelegramCallback)$", Auth),
    ]
});

/// Entity assigned to literal authentication operations
pub const AUTH_ENTITY: &str = "Token";

// =============================================================================
// Operations
// =============================================================================

/// Remove a trailing `Dto`, keeping Response/Request markers
pub fn strip_dto_suffix(name: &str) -> &str {
    name.strip_suffix("Dto").unwrap_or(name)
}

/// Payload direction of a name; `Body` counts as a request
pub fn type_suffix(name: &str) -> Option<TypeSuffix> {
    if name.contains("Response") {
        Some(TypeSuffix::Response)
    } else if name.contains("Request") || name.contains("Body") {
        Some(TypeSuffix::Request)
    } else {
        None
    }
}

/// Whether the (Dto-stripped) name contains a collection indicator
pub fn is_collection_name(name: &str) -> bool {
    let clean = strip_dto_suffix(name);
    COLLECTION_INDICATORS.iter().any(|indicator| clean.contains(indicator))
}

/// Decompose a schema name into entity, action kind and collection flag.
pub fn extract_entity(name: &str) -> EntityInfo {
    let clean = strip_dto_suffix(name);
    let is_collection = is_collection_name(name);

    for rule in ENTITY_RULES.iter() {
        let Some(captures) = rule.pattern.captures(clean) else {
            continue;
        };
        return match rule.kind {
            RuleKind::Auth => EntityInfo {
                entity: AUTH_ENTITY.to_string(),
                action: ActionKind::Auth,
                is_collection,
            },
            RuleKind::Capture => {
                let captured = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
                EntityInfo {
                    entity: singularize(captured).to_string(),
                    action: ActionKind::Crud,
                    is_collection,
                }
            }
        };
    }

    let entity = FALLBACK_VERBS
        .iter()
        .find_map(|verb| clean.strip_prefix(verb))
        .unwrap_or(clean);

    EntityInfo {
        entity: entity.to_string(),
        action: ActionKind::Unknown,
        is_collection,
    }
}

/// Drop a trailing plural `s` from entities longer than three characters
fn singularize(entity: &str) -> &str {
    if entity.len() > PLURAL_MIN_LEN {
        entity.strip_suffix('s').unwrap_or(entity)
    } else {
        entity
    }
}

/// Aggregate entity and direction over a group of names.
pub fn analyze_group<S: AsRef<str>>(names: &[S]) -> GroupAnalysis {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut actions = BTreeSet::new();
    let mut has_response = false;
    let mut has_request = false;
    let mut is_collection = false;

    for name in names {
        let name = name.as_ref();
        let info = extract_entity(name);
        match type_suffix(name) {
            Some(TypeSuffix::Response) => has_response = true,
            Some(TypeSuffix::Request) => has_request = true,
            None => {}
        }
        is_collection |= info.is_collection;
        actions.insert(info.action);

        let count = counts.entry(info.entity.clone()).or_insert(0);
        if *count == 0 {
            order.push(info.entity);
        }
        *count += 1;
    }

    // Highest count, then shortest; `order` keeps the first-seen entity on full ties
    let mut entity = String::new();
    let mut best: Option<(usize, usize)> = None;
    for candidate in &order {
        let count = counts[candidate];
        let better = match best {
            None => true,
            Some((best_count, best_len)) => {
                count > best_count || (count == best_count && candidate.len() < best_len)
            }
        };
        if better {
            best = Some((count, candidate.len()));
            entity = candidate.clone();
        }
    }

    GroupAnalysis {
        entity,
        is_response: has_response && !has_request,
        is_request: has_request && !has_response,
        is_mixed: has_response && has_request,
        is_collection,
        actions,
        all_entities: order.into_iter().collect(),
    }
}

/// Uppercase the first character
pub fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
