//! Duplicate Consolidation
//!
//! Finds schemas that duplicate each other, picks one canonical name per
//! exact-duplicate group and rewrites the document so every member collapses
//! into that name.
//!
//! ## Stages
//!
//! - [`Consolidator::analyze`] reports duplicates at every fidelity level
//! - [`Consolidator::consolidate`] plans a [`RenameMap`] from exact duplicates
//! - [`Consolidator::apply`] produces a new document with schemas merged and
//!   references rewritten
//!
//! The input document is never mutated.

pub mod patterns;
pub mod report;

use serde_json::Map;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

use crate::analysis::{analyze_group, attribute_key, attribute_shape, signature, strip_dto_suffix};
use crate::checksum::Checksum;
use crate::config::ConsolidationConfig;
use crate::document::Document;
use crate::error::Result;
use crate::rename::RenameMap;

pub use patterns::{PatternGroup, PatternRegistry, PatternScore};
pub use report::{
    ConsolidatedGroup, ConsolidationStats, DuplicateGroup, DuplicateReport, Fidelity, LevelSummary,
};

/// Names that must never share a canonical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeExclusion(BTreeSet<String>);

impl MergeExclusion {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    fn is_subset_of(&self, members: &BTreeSet<&str>) -> bool {
        self.0.iter().all(|name| members.contains(name.as_str()))
    }
}

/// A planned consolidation
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    pub rename_map: RenameMap,
    pub stats: ConsolidationStats,
}

/// Canonical names claimed during one consolidation pass
///
/// A name is available when no earlier group claimed it and it is not an
/// existing schema outside the group being named.
#[derive(Debug, Default)]
pub struct NameLedger {
    existing: HashSet<String>,
    claimed: HashSet<String>,
}

impl NameLedger {
    pub fn new<'a>(existing: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            existing: existing.into_iter().map(str::to_string).collect(),
            claimed: HashSet::new(),
        }
    }

    /// Claim `base` for `members`, suffixing 2, 3, ... until it is free
    pub fn claim(&mut self, base: &str, members: &[String]) -> String {
        let taken = |candidate: &str, claimed: &HashSet<String>| {
            claimed.contains(candidate)
                || (self.existing.contains(candidate) && !members.iter().any(|m| m == candidate))
        };

        let mut candidate = base.to_string();
        let mut counter = 2;
        while taken(&candidate, &self.claimed) {
            candidate = format!("{}{}", base, counter);
            counter += 1;
        }
        self.claimed.insert(candidate.clone());
        candidate
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }
}

/// Duplicate finder and merger over one document
#[derive(Debug, Clone)]
pub struct Consolidator<'a> {
    document: &'a Document,
    registry: PatternRegistry,
    exclusions: Vec<MergeExclusion>,
    name_threshold: f64,
}

impl<'a> Consolidator<'a> {
    /// Consolidator with the built-in registry and default settings
    pub fn new(document: &'a Document) -> Self {
        let defaults = ConsolidationConfig::default();
        Self {
            document,
            registry: PatternRegistry::builtin(),
            exclusions: exclusions_from(&defaults.merge_exclusions),
            name_threshold: defaults.name_threshold,
        }
    }

    pub fn from_config(document: &'a Document, config: &ConsolidationConfig) -> Result<Self> {
        Ok(Self {
            document,
            registry: PatternRegistry::builtin().with_extra(&config.extra_pattern_groups)?,
            exclusions: exclusions_from(&config.merge_exclusions),
            name_threshold: config.name_threshold,
        })
    }

    pub fn with_registry(mut self, registry: PatternRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_exclusions(mut self, exclusions: Vec<MergeExclusion>) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    // =========================================================================
    // Duplicate discovery
    // =========================================================================

    /// Groups of two or more schemas sharing a fingerprint, ordered by first member
    pub fn find_duplicates(&self, fidelity: Fidelity) -> Vec<DuplicateGroup> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<DuplicateGroup> = Vec::new();

        for (name, schema) in self.document.schemas() {
            let key = match fidelity {
                Fidelity::Exact => Checksum::from_json(schema).to_string(),
                Fidelity::Structural => signature(schema, true),
                Fidelity::StructuralLoose => signature(schema, false),
                Fidelity::Attribute => attribute_key(&attribute_shape(schema)),
            };
            match index.get(&key).copied() {
                Some(position) => groups[position].names.push(name.clone()),
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push(DuplicateGroup {
                        fidelity,
                        key,
                        names: vec![name.clone()],
                    });
                }
            }
        }

        groups.retain(|group| group.len() >= 2);
        groups
    }

    /// Duplicates at every fidelity, plus near-duplicate and constraint-only diagnostics
    pub fn analyze(&self) -> DuplicateReport {
        let exact = self.find_duplicates(Fidelity::Exact);
        let structural = self.find_duplicates(Fidelity::Structural);
        let structural_loose = self.find_duplicates(Fidelity::StructuralLoose);
        let attribute = self.find_duplicates(Fidelity::Attribute);

        let near_duplicates = groups_not_in(&structural, &exact);
        let constraint_only = groups_not_in(&structural_loose, &structural);

        debug!(
            "Duplicate analysis: {} exact, {} structural, {} loose, {} attribute groups",
            exact.len(),
            structural.len(),
            structural_loose.len(),
            attribute.len()
        );

        DuplicateReport {
            exact: LevelSummary::new(exact),
            structural: LevelSummary::new(structural),
            structural_loose: LevelSummary::new(structural_loose),
            attribute: LevelSummary::new(attribute),
            near_duplicates: LevelSummary::new(near_duplicates),
            constraint_only: LevelSummary::new(constraint_only),
        }
    }

    // =========================================================================
    // Naming
    // =========================================================================

    /// Canonical name for a group, before uniqueness is enforced.
    ///
    /// The best-scoring registry group wins when its score reaches the
    /// threshold; otherwise the name is built from the group's entity.
    pub fn generate_canonical_name<S: AsRef<str>>(&self, names: &[S]) -> String {
        if let Some(best) = self.registry.best_match(names) {
            if best.score >= self.name_threshold {
                return best.canonical.to_string();
            }
        }

        let analysis = analyze_group(names);
        let entity = analysis.entity;
        let name = if analysis.is_request {
            if analysis.is_collection {
                format!("{}BulkRequest", entity)
            } else {
                format!("{}Request", entity)
            }
        } else if analysis.is_response {
            if analysis.is_collection {
                format!("{}ListResponse", entity)
            } else {
                format!("{}Response", entity)
            }
        } else {
            entity
        };

        if name.is_empty() {
            // Nothing survived verb stripping; keep the first member's name
            return names
                .first()
                .map(|n| strip_dto_suffix(n.as_ref()).to_string())
                .unwrap_or_default();
        }
        name
    }

    // =========================================================================
    // Planning and application
    // =========================================================================

    /// Plan the merge of every exact-duplicate group.
    pub fn consolidate(&self) -> Consolidation {
        let groups = self.find_duplicates(Fidelity::Exact);
        let original_count = self.document.schema_count();

        let mut ledger = NameLedger::new(self.document.schema_names());
        let mut rename_map = RenameMap::new();
        let mut stats = ConsolidationStats {
            original_count,
            duplicate_groups: groups.len(),
            ..Default::default()
        };

        for group in &groups {
            let members = group.member_set();
            let excluded: BTreeSet<&str> = self
                .exclusions
                .iter()
                .filter(|exclusion| exclusion.is_subset_of(&members))
                .flat_map(|exclusion| exclusion.names())
                .collect();

            let names: Vec<String> = group
                .names
                .iter()
                .filter(|name| !excluded.contains(name.as_str()))
                .cloned()
                .collect();

            if !excluded.is_empty() {
                debug!("Merge exclusion holds back {:?} from {:?}", excluded, group.names);
                stats.excluded.extend(excluded.iter().map(|n| n.to_string()));
            }
            if names.len() < 2 {
                continue;
            }

            let base = self.generate_canonical_name(&names);
            let canonical = ledger.claim(&base, &names);
            debug!("{} <- {:?}", canonical, names);

            for name in &names {
                rename_map.insert(name.clone(), canonical.clone());
            }
            stats.consolidated.push(ConsolidatedGroup {
                canonical,
                members: names,
            });
        }

        stats.final_count = original_count - rename_map.len() + rename_map.canonical_count();
        stats.reduction = original_count.saturating_sub(stats.final_count);

        info!(
            "Planned {} merges: {} -> {} schemas",
            stats.consolidated.len(),
            original_count,
            stats.final_count
        );

        Consolidation { rename_map, stats }
    }

    /// New document with every renamed schema merged into its canonical slot.
    ///
    /// Schemas are visited in document order and the first one to reach a
    /// canonical slot supplies its body. Fails if the result has references to
    /// missing schemas that the input did not have.
    pub fn apply(&self, renames: &RenameMap) -> Result<Document> {
        let mut output = self.document.clone();

        let mut merged = Map::new();
        let mut dropped = 0usize;
        for (name, schema) in std::mem::take(output.schemas_mut()) {
            let canonical = renames.resolve(&name).to_string();
            if merged.contains_key(&canonical) {
                dropped += 1;
                continue;
            }
            merged.insert(canonical, schema);
        }
        output.set_schemas(merged);

        let rewritten = output.rewrite_refs(renames);
        info!(
            "Merged {} duplicate schemas, rewrote {} references",
            dropped, rewritten
        );

        output.verify_references("apply", self.document, renames)?;
        Ok(output)
    }
}

fn exclusions_from(sets: &[Vec<String>]) -> Vec<MergeExclusion> {
    sets.iter().map(|set| MergeExclusion::new(set.iter().cloned())).collect()
}

/// Groups of `candidates` whose member set matches no group of `reference`
fn groups_not_in(candidates: &[DuplicateGroup], reference: &[DuplicateGroup]) -> Vec<DuplicateGroup> {
    let known: HashSet<BTreeSet<&str>> = reference.iter().map(DuplicateGroup::member_set).collect();
    candidates
        .iter()
        .filter(|group| !known.contains(&group.member_set()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn document(schemas: Value) -> Document {
        Document::from_value(json!({"components": {"schemas": schemas}})).unwrap()
    }

    fn user_schema() -> Value {
        json!({"type": "object", "properties": {"id": {"type": "string"}}})
    }

    #[test]
    fn test_find_exact_duplicates_ignores_key_order() {
        let doc = document(json!({
            "A": {"type": "object", "properties": {"id": {"type": "string"}}},
            "B": {"properties": {"id": {"type": "string"}}, "type": "object"},
            "C": {"type": "string"}
        }));
        let groups = Consolidator::new(&doc).find_duplicates(Fidelity::Exact);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].names, vec!["A", "B"]);
        assert_eq!(groups[0].fidelity, Fidelity::Exact);
    }

    #[test]
    fn test_fidelity_levels_nest() {
        let doc = document(json!({
            "A": {"type": "object", "properties": {"id": {"type": "string", "minLength": 1}}},
            "B": {"type": "object", "description": "B", "properties": {"id": {"type": "string", "minLength": 1}}},
            "C": {"type": "object", "properties": {"id": {"type": "string", "minLength": 5}}},
            "D": {"type": "object", "properties": {"id": {"type": "string", "format": "uuid"}}}
        }));
        let consolidator = Consolidator::new(&doc);
        let report = consolidator.analyze();

        assert_eq!(report.exact.count, 0);
        assert_eq!(report.structural.groups[0].names, vec!["A", "B"]);
        assert_eq!(report.structural_loose.groups[0].names, vec!["A", "B", "C"]);
        assert_eq!(report.attribute.groups[0].names, vec!["A", "B", "C", "D"]);

        assert_eq!(report.near_duplicates.count, 1);
        assert_eq!(report.near_duplicates.groups[0].names, vec!["A", "B"]);
        assert_eq!(report.constraint_only.count, 1);
        assert_eq!(report.constraint_only.total_schemas, 3);
    }

    #[test]
    fn test_canonical_name_from_registry() {
        let doc = document(json!({}));
        let consolidator = Consolidator::new(&doc);
        assert_eq!(
            consolidator.generate_canonical_name(&["GetUserByUuidResponseDto", "CreateUserResponseDto"]),
            "UserResponse"
        );
        assert_eq!(
            consolidator.generate_canonical_name(&["BulkDeleteHostsRequestDto", "BulkEnableHostsRequestDto"]),
            "BulkUuidsRequest"
        );
    }

    #[test]
    fn test_canonical_name_fallbacks() {
        let doc = document(json!({}));
        let consolidator = Consolidator::new(&doc);
        // Verb rules keep the Request/Response marker inside the entity
        assert_eq!(
            consolidator.generate_canonical_name(&["CreateWidgetRequestDto", "UpdateWidgetRequestDto"]),
            "WidgetRequestRequest"
        );
        assert_eq!(
            consolidator.generate_canonical_name(&["FindAllWidgetsResponseDto", "FetchWidgetsResponse"]),
            "WidgetsResponseListResponse"
        );
        assert_eq!(
            consolidator.generate_canonical_name(&["CreateWidgetRequestDto", "WidgetResponseDto"]),
            "WidgetRequest"
        );
        assert_eq!(consolidator.generate_canonical_name(&["CreateWidgetDto", "UpdateWidget"]), "Widget");
        assert_eq!(consolidator.generate_canonical_name(&["UserA", "UserB"]), "UserA");
    }

    #[test]
    fn test_low_score_falls_through() {
        let doc = document(json!({}));
        let consolidator = Consolidator::new(&doc);
        // One of three names matches HostResponse: 0.33 < 0.5
        assert_eq!(
            consolidator.generate_canonical_name(&["GetOneHostResponseDto", "HostInfoDto", "HostViewDto"]),
            "HostInfoResponse"
        );
    }

    #[test]
    fn test_consolidate_scenario_user_a_user_b() {
        let doc = document(json!({"UserA": user_schema(), "UserB": user_schema()}));
        let consolidator = Consolidator::new(&doc);
        let plan = consolidator.consolidate();

        assert_eq!(plan.rename_map.resolve("UserA"), "UserA");
        assert_eq!(plan.rename_map.resolve("UserB"), "UserA");
        assert_eq!(plan.stats.final_count, 1);
        assert_eq!(plan.stats.reduction, 1);

        let output = consolidator.apply(&plan.rename_map).unwrap();
        assert_eq!(output.schema_names().collect::<Vec<_>>(), vec!["UserA"]);
    }

    #[test]
    fn test_canonical_names_unique_across_groups() {
        let doc = document(json!({
            "CreateWidgetDto": {"type": "object", "properties": {"a": {"type": "string"}}},
            "UpdateWidgetDto": {"type": "object", "properties": {"a": {"type": "string"}}},
            "CreateWidget": {"type": "object", "properties": {"b": {"type": "integer"}}},
            "UpdateWidget": {"type": "object", "properties": {"b": {"type": "integer"}}}
        }));
        let plan = Consolidator::new(&doc).consolidate();
        let canonicals: Vec<&str> = plan.stats.consolidated.iter().map(|g| g.canonical.as_str()).collect();
        assert_eq!(canonicals, vec!["Widget", "Widget2"]);
    }

    #[test]
    fn test_canonical_name_avoids_unrelated_existing_schema() {
        let doc = document(json!({
            "Widget": {"type": "boolean"},
            "CreateWidgetDto": {"type": "object", "properties": {"a": {"type": "string"}}},
            "UpdateWidgetDto": {"type": "object", "properties": {"a": {"type": "string"}}}
        }));
        let consolidator = Consolidator::new(&doc);
        let plan = consolidator.consolidate();
        assert_eq!(plan.rename_map.resolve("CreateWidgetDto"), "Widget2");

        let output = consolidator.apply(&plan.rename_map).unwrap();
        assert_eq!(output.schema("Widget"), Some(&json!({"type": "boolean"})));
        assert_eq!(output.schema_count(), 2);
    }

    #[test]
    fn test_merge_exclusion_splits_group() {
        let doc = document(json!({
            "A": user_schema(),
            "B": user_schema(),
            "C": user_schema(),
            "D": user_schema()
        }));
        let consolidator =
            Consolidator::new(&doc).with_exclusions(vec![MergeExclusion::new(["A", "B"])]);
        let plan = consolidator.consolidate();

        assert!(!plan.rename_map.contains("A"));
        assert!(!plan.rename_map.contains("B"));
        assert_eq!(plan.rename_map.resolve("C"), plan.rename_map.resolve("D"));
        assert_eq!(plan.stats.excluded, vec!["A", "B"]);
        // 4 - 2 renamed + 1 canonical
        assert_eq!(plan.stats.final_count, 3);

        let output = consolidator.apply(&plan.rename_map).unwrap();
        assert_eq!(output.schema_count(), plan.stats.final_count);
    }

    #[test]
    fn test_merge_exclusion_leaves_singleton_unmapped() {
        let doc = document(json!({"A": user_schema(), "B": user_schema(), "C": user_schema()}));
        let plan = Consolidator::new(&doc)
            .with_exclusions(vec![MergeExclusion::new(["A", "B"])])
            .consolidate();
        assert!(plan.rename_map.is_empty());
        assert_eq!(plan.stats.final_count, 3);
        assert_eq!(plan.stats.reduction, 0);
    }

    #[test]
    fn test_default_exclusion_applies() {
        let doc = document(json!({
            "CreateExternalSquadRequestDto": user_schema(),
            "CreateSubscriptionPageConfigRequestDto": user_schema()
        }));
        let plan = Consolidator::new(&doc).consolidate();
        assert!(plan.rename_map.is_empty());
        assert_eq!(plan.stats.duplicate_groups, 1);
    }

    #[test]
    fn test_apply_first_writer_wins_in_document_order() {
        let doc = document(json!({
            "Second": {"type": "object", "description": "kept", "properties": {"id": {"type": "string"}}},
            "First": {"type": "object", "description": "dropped", "properties": {"id": {"type": "string"}}}
        }));
        let mut renames = RenameMap::new();
        renames.insert("Second", "Merged");
        renames.insert("First", "Merged");
        let output = Consolidator::new(&doc).apply(&renames).unwrap();
        assert_eq!(output.schema("Merged").unwrap()["description"], "kept");
    }

    #[test]
    fn test_apply_keeps_input_untouched() {
        let doc = document(json!({"UserA": user_schema(), "UserB": user_schema()}));
        let snapshot = doc.clone();
        let consolidator = Consolidator::new(&doc);
        let plan = consolidator.consolidate();
        consolidator.apply(&plan.rename_map).unwrap();
        assert_eq!(doc, snapshot);
    }

    #[test]
    fn test_apply_tolerates_preexisting_dangling_refs() {
        let doc = document(json!({
            "UserA": user_schema(),
            "UserB": user_schema(),
            "Holder": {"type": "object", "properties": {
                "user": {"$ref": "#/components/schemas/UserB"},
                "ghost": {"$ref": "#/components/schemas/Ghost"}
            }}
        }));
        let consolidator = Consolidator::new(&doc);
        let plan = consolidator.consolidate();
        let output = consolidator.apply(&plan.rename_map).unwrap();

        let holder = output.schema("Holder").unwrap();
        assert_eq!(holder["properties"]["user"]["$ref"], "#/components/schemas/UserA");
        assert_eq!(output.dangling_references().len(), 1);
    }

    #[test]
    fn test_name_ledger() {
        let mut ledger = NameLedger::new(["Taken"]);
        assert_eq!(ledger.claim("Taken", &["Other".to_string()]), "Taken2");
        assert_eq!(ledger.claim("Taken", &["Taken".to_string()]), "Taken");
        assert_eq!(ledger.claim("Fresh", &[]), "Fresh");
        assert_eq!(ledger.claim("Fresh", &[]), "Fresh2");
        assert!(ledger.is_claimed("Fresh2"));
    }
}
