//! Names for extracted inline schemas
//!
//! A name is derived from where a shape occurs: the owning schema names and
//! the property paths. When two different shapes derive the same name, the
//! conflict table assigns each a suffix from its context.

use std::collections::HashMap;

use super::InlineOccurrence;
use crate::analysis::capitalize_first;

/// Property names too generic to stand alone
pub const GENERIC_NAMES: &[&str] = &[
    "Config", "Items", "Data", "Info", "Details", "Settings", "Options", "Params", "Json", "Object",
    "Value", "Item",
];

/// Property that wraps an endpoint's payload
const PAYLOAD_WRAPPER: &str = "response";

/// Verbs stripped from owners of payload-wrapper shapes; only the first match is removed
const PAYLOAD_VERBS: &[&str] = &["Create", "Update", "Get", "Delete", "Bulk", "GetAll", "GetOne"];

/// Prefixes stripped, in sequence, when building an entity context
const CONTEXT_PREFIXES: &[&str] = &[
    "Create",
    "Update",
    "Get",
    "Delete",
    "Bulk",
    "GetAll",
    "GetOne",
    "GetRaw",
    "Subscription",
    "By",
    "All",
];

/// Lookup qualifiers removed from an entity context
const LOOKUP_QUALIFIERS: &[&str] = &["ByShortUuid", "ByUuid", "ByUsername", "ByEmail", "ById"];

const MAX_ENTITY_LEN: usize = 20;

// =============================================================================
// Base names
// =============================================================================

/// Name for a repeated inline shape, before conflicts are resolved.
pub fn generate_extracted_name(occurrences: &[InlineOccurrence]) -> String {
    let is_array = occurrences.iter().any(|o| o.path.is_array());

    if let Some(name) = payload_wrapper_name(occurrences, is_array) {
        return name;
    }
    if let Some(name) = property_name(occurrences, is_array) {
        return name;
    }

    // Fallback: first owner plus the first path's leaf
    let Some(first) = occurrences.first() else {
        return String::new();
    };
    let owner = first
        .owner
        .replace("ResponseDto", "")
        .replace("RequestDto", "")
        .replace("Dto", "");
    let leaf = first.path.last_property().unwrap_or_default();
    format!("{}{}", owner, capitalize_first(leaf))
}

/// Every path is `response` or `response[]`: name after the owners' entity
fn payload_wrapper_name(occurrences: &[InlineOccurrence], is_array: bool) -> Option<String> {
    let all_wrappers = occurrences.iter().all(|o| {
        let path = o.path.to_string();
        path == PAYLOAD_WRAPPER || path == format!("{}[]", PAYLOAD_WRAPPER)
    });
    if !all_wrappers {
        return None;
    }

    let entities = occurrences.iter().filter_map(|o| {
        let clean = o
            .owner
            .replace("Response", "")
            .replace("Request", "")
            .replace("Dto", "");
        let entity = PAYLOAD_VERBS
            .iter()
            .find_map(|verb| clean.strip_prefix(verb))
            .unwrap_or(&clean)
            .to_string();
        (!entity.is_empty()).then_some(entity)
    });

    let common = most_common(entities)?;
    Some(if is_array {
        format!("{}Item", common)
    } else {
        common
    })
}

/// Name after the most common leaf property, with entity context when generic
fn property_name(occurrences: &[InlineOccurrence], is_array: bool) -> Option<String> {
    let leaves = occurrences
        .iter()
        .filter_map(|o| o.path.last_property())
        .filter(|leaf| !leaf.is_empty() && *leaf != PAYLOAD_WRAPPER)
        .map(str::to_string);

    let mut name = capitalize_first(&most_common(leaves)?);

    if GENERIC_NAMES.contains(&name.as_str()) || name.ends_with("Item") {
        if let Some(entity) = context_entity(occurrences) {
            name = format!("{}{}", entity, name);
        }
    }

    if is_array && !name.ends_with("Item") && !name.ends_with('s') {
        name.push_str("Item");
    }
    if is_array && name.ends_with('s') && name.chars().count() > 3 && !name.ends_with("Settings") {
        name.pop();
    }
    Some(name)
}

/// Most common owner entity with verbs, context words and lookup qualifiers removed
fn context_entity(occurrences: &[InlineOccurrence]) -> Option<String> {
    let entities = occurrences.iter().filter_map(|o| {
        let mut clean = o
            .owner
            .replace("ResponseDto", "")
            .replace("RequestDto", "")
            .replace("Dto", "");
        for prefix in CONTEXT_PREFIXES {
            if let Some(rest) = clean.strip_prefix(prefix) {
                clean = rest.to_string();
            }
        }
        (!clean.is_empty()).then(|| clean.chars().take(MAX_ENTITY_LEN).collect::<String>())
    });

    let mut entity = most_common(entities)?;
    for qualifier in LOOKUP_QUALIFIERS {
        entity = entity.replace(qualifier, "");
    }
    Some(entity)
}

/// Most frequent value; ties go to the first seen
fn most_common(values: impl Iterator<Item = String>) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for value in values {
        let count = counts.entry(value.clone()).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    let mut best: Option<(usize, String)> = None;
    for value in order {
        let count = counts[&value];
        if best.as_ref().map_or(true, |(best_count, _)| count > *best_count) {
            best = Some((count, value));
        }
    }
    best.map(|(_, value)| value)
}

// =============================================================================
// Conflict suffixes
// =============================================================================

/// What a conflict rule can inspect about one colliding shape
pub struct ConflictContext<'a> {
    pub base: &'a str,
    pub owners: Vec<&'a str>,
    pub paths: Vec<String>,
}

impl<'a> ConflictContext<'a> {
    pub fn new(base: &'a str, occurrences: &'a [InlineOccurrence]) -> Self {
        Self {
            base,
            owners: occurrences.iter().map(|o| o.owner.as_str()).collect(),
            paths: occurrences.iter().map(|o| o.path.to_string()).collect(),
        }
    }

    fn owner_contains(&self, needle: &str) -> bool {
        self.owners.iter().any(|owner| owner.contains(needle))
    }

    fn path_contains(&self, needle: &str) -> bool {
        self.paths.iter().any(|path| path.contains(needle))
    }
}

struct ConflictRule {
    suffix: &'static str,
    applies: fn(&ConflictContext<'_>) -> bool,
}

/// Contextual suffixes, first applicable rule wins
const CONFLICT_RULES: &[ConflictRule] = &[
    ConflictRule {
        suffix: "Ref",
        applies: |c| c.owner_contains("Request") && !c.owner_contains("Response"),
    },
    ConflictRule {
        suffix: "Info",
        applies: |c| c.path_contains(".subscriptionSettings"),
    },
    ConflictRule {
        suffix: "Squad",
        applies: |c| c.base == "SubscriptionSettings" && c.owner_contains("Squad"),
    },
    ConflictRule {
        suffix: "Ref",
        applies: |c| c.base == "Template" && c.owner_contains("Squad"),
    },
    ConflictRule {
        suffix: "Billing",
        applies: |c| c.base == "Record" && c.owner_contains("Billing"),
    },
    ConflictRule {
        suffix: "Item",
        applies: |c| c.base == "Snippet" && c.path_contains("snippets[]"),
    },
    ConflictRule {
        suffix: "Full",
        applies: |c| c.base == "Inbound" && c.owner_contains("GetAllInbounds"),
    },
    ConflictRule {
        suffix: "Embed",
        applies: |c| {
            c.base == "Inbound" && c.path_contains(".inbound") && !c.path_contains("inbounds[]")
        },
    },
    ConflictRule {
        suffix: "Order",
        applies: |c| c.base == "Node" && c.owner_contains("Reorder"),
    },
    ConflictRule {
        suffix: "Ref",
        applies: |c| c.base == "BillingNode" && c.owner_contains("Provider"),
    },
    ConflictRule {
        suffix: "HistoryRef",
        applies: |c| c.base == "ProviderItem" && c.owner_contains("BillingHistory"),
    },
    ConflictRule {
        suffix: "BillingRef",
        applies: |c| c.base == "ProviderItem" && c.owner_contains("BillingNode"),
    },
];

/// Contextual suffix for one member of a name collision, if any rule applies
pub fn conflict_suffix(base: &str, occurrences: &[InlineOccurrence]) -> Option<&'static str> {
    let context = ConflictContext::new(base, occurrences);
    CONFLICT_RULES
        .iter()
        .find(|rule| (rule.applies)(&context))
        .map(|rule| rule.suffix)
}

/// Final names for shapes sharing one base name.
///
/// Each member takes its contextual suffix; a member with no suffix, or one
/// already taken in the collision, falls back to its 1-based position (empty
/// for the first member).
pub fn disambiguate(base: &str, members: &[&[InlineOccurrence]]) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();
    members
        .iter()
        .enumerate()
        .map(|(i, occurrences)| {
            let suffix = match conflict_suffix(base, occurrences) {
                Some(suffix) if !used.iter().any(|u| u == suffix) => suffix.to_string(),
                _ if i > 0 => (i + 1).to_string(),
                _ => String::new(),
            };
            let name = format!("{}{}", base, suffix);
            used.push(suffix);
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PropertyPath;
    use serde_json::json;

    fn occ(owner: &str, path: &str) -> InlineOccurrence {
        InlineOccurrence {
            owner: owner.to_string(),
            path: PropertyPath::parse(path),
            node: json!({"type": "object", "properties": {"a": {"type": "string"}}}),
        }
    }

    #[test]
    fn test_payload_wrapper_name() {
        let occurrences = [occ("GetUserResponseDto", "response"), occ("UpdateUserResponseDto", "response")];
        assert_eq!(generate_extracted_name(&occurrences), "User");

        let occurrences = [occ("GetAllNodesResponseDto", "response[]"), occ("CreateNodeResponseDto", "response")];
        // AllNodes, Node tie -> first seen
        assert_eq!(generate_extracted_name(&occurrences), "AllNodesItem");
    }

    #[test]
    fn test_payload_wrapper_strips_only_get() {
        let occurrences = [occ("GetAllHostsResponseDto", "response[]"), occ("GetAllHostsResponseDto", "response[]")];
        assert_eq!(generate_extracted_name(&occurrences), "AllHostsItem");

        let occurrences = [occ("GetOneHostResponseDto", "response"), occ("GetOneHostResponseDto", "response")];
        assert_eq!(generate_extracted_name(&occurrences), "OneHost");

        let occurrences = [occ("BulkDeleteUsersResponseDto", "response"), occ("BulkDeleteUsersResponseDto", "response")];
        assert_eq!(generate_extracted_name(&occurrences), "DeleteUsers");
    }

    #[test]
    fn test_specific_leaf_name() {
        let occurrences = [occ("GetFooResponseDto", "response.owner"), occ("GetBarResponseDto", "response.owner")];
        assert_eq!(generate_extracted_name(&occurrences), "Owner");
    }

    #[test]
    fn test_generic_leaf_gets_entity_prefix() {
        let occurrences = [
            occ("GetFooResponseDto", "response.details"),
            occ("GetBarResponseDto", "response.details"),
        ];
        assert_eq!(generate_extracted_name(&occurrences), "FooDetails");

        let occurrences = [
            occ("GetSubscriptionByShortUuidResponseDto", "response.settings"),
            occ("GetSubscriptionByShortUuidResponseDto", "response.info.settings"),
        ];
        // Prefixes strip cumulatively: Get, Subscription, By
        assert_eq!(generate_extracted_name(&occurrences), "ShortUuidSettings");
    }

    #[test]
    fn test_array_leaf_is_singularized() {
        let occurrences = [occ("GetAllUsersResponseDto", "response.users[]"), occ("GetTeamResponseDto", "response.members[]")];
        assert_eq!(generate_extracted_name(&occurrences), "User");

        let occurrences = [occ("A", "tags[]"), occ("B", "tags[]")];
        assert_eq!(generate_extracted_name(&occurrences), "Tag");

        let occurrences = [occ("A", "entry[]"), occ("B", "entry[]")];
        assert_eq!(generate_extracted_name(&occurrences), "EntryItem");

        let occurrences = [occ("A", "squadSettings[]"), occ("B", "squadSettings[]")];
        assert_eq!(generate_extracted_name(&occurrences), "SquadSettings");

        // Length counts characters, not bytes
        let occurrences = [occ("A", "ébs[]"), occ("B", "ébs[]")];
        assert_eq!(generate_extracted_name(&occurrences), "Ébs");
        let occurrences = [occ("A", "éårs[]"), occ("B", "éårs[]")];
        assert_eq!(generate_extracted_name(&occurrences), "Éår");
    }

    #[test]
    fn test_fallback_name() {
        // Wrapper paths but no owner entity survives stripping
        let occurrences = [occ("GetResponseDto", "response"), occ("CreateDto", "response")];
        assert_eq!(generate_extracted_name(&occurrences), "GetResponse");
    }

    #[test]
    fn test_conflict_suffix_rules() {
        assert_eq!(conflict_suffix("Config", &[occ("CreateNodeRequestDto", "configProfile")]), Some("Ref"));
        assert_eq!(
            conflict_suffix("User", &[occ("GetSquadResponseDto", "response.subscriptionSettings")]),
            Some("Info")
        );
        assert_eq!(
            conflict_suffix("SubscriptionSettings", &[occ("GetExternalSquadsResponseDto", "response.x")]),
            Some("Squad")
        );
        assert_eq!(
            conflict_suffix("Inbound", &[occ("GetAllInboundsResponseDto", "response[]")]),
            Some("Full")
        );
        assert_eq!(
            conflict_suffix("Inbound", &[occ("GetHostResponseDto", "response.inbound")]),
            Some("Embed")
        );
        assert_eq!(
            conflict_suffix("ProviderItem", &[occ("GetInfraBillingNodesResponseDto", "response.provider")]),
            Some("BillingRef")
        );
        assert_eq!(conflict_suffix("Widget", &[occ("GetWidgetResponseDto", "response.x")]), None);
    }

    #[test]
    fn test_disambiguate() {
        let plain = [occ("GetWidgetResponseDto", "response.node")];
        let reorder = [occ("ReorderNodeResponseDto", "response.node")];
        let other = [occ("GetThingResponseDto", "response.node")];

        let names = disambiguate("Node", &[&plain[..], &reorder[..], &other[..]]);
        assert_eq!(names, vec!["Node", "NodeOrder", "Node3"]);

        // A repeated contextual suffix falls back to the position
        let first = [occ("CreateARequestDto", "x")];
        let second = [occ("CreateBRequestDto", "x")];
        let names = disambiguate("Config", &[&first[..], &second[..]]);
        assert_eq!(names, vec!["ConfigRef", "Config2"]);
    }
}
