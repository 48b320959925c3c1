//! Inline Schema Extraction
//!
//! Finds object shapes declared inline (as property values or array items)
//! that repeat across the document, lifts each repeated shape into a named
//! top-level schema and replaces every occurrence with a reference to it.
//!
//! Shapes are processed deepest first, so an outer shape is lifted only after
//! the shapes nested in it already point at their own schemas.

pub mod naming;
pub mod path;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::analysis::{is_inline_object_map, signature};
use crate::config::ExtractionConfig;
use crate::document::Document;
use crate::error::Result;
use crate::rename::RenameMap;
use crate::tree::{walk, NodeRef, SchemaPosition, TreePath, Visitor, Walk};

pub use naming::{conflict_suffix, disambiguate, generate_extracted_name, GENERIC_NAMES};
pub use path::{PathStep, PropertyPath};

/// Fewest occurrences that make a shape worth extracting
pub const MIN_OCCURRENCES: usize = 2;

/// One place an inline shape appears
#[derive(Debug, Clone, PartialEq)]
pub struct InlineOccurrence {
    /// Top-level schema holding the shape
    pub owner: String,
    pub path: PropertyPath,
    /// The inline node as found
    pub node: Value,
}

/// All occurrences of one inline shape
#[derive(Debug, Clone, PartialEq)]
pub struct InlineGroup {
    pub signature: String,
    pub occurrences: Vec<InlineOccurrence>,
}

impl InlineGroup {
    pub fn max_depth(&self) -> usize {
        self.occurrences
            .iter()
            .map(|o| o.path.depth())
            .max()
            .unwrap_or(0)
    }

    pub fn is_array(&self) -> bool {
        self.occurrences.iter().any(|o| o.path.is_array())
    }
}

/// A schema created by extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedSchema {
    pub name: String,
    /// `owner.path` of every occurrence
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub extracted_count: usize,
    pub extracted: Vec<ExtractedSchema>,
    /// Occurrences replaced with a reference
    pub replaced: usize,
    /// Occurrences whose path no longer resolved
    pub skipped_occurrences: usize,
}

/// Result of an extraction pass
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: Document,
    pub stats: ExtractionStats,
}

/// Repeated inline shape finder and extractor over one document
#[derive(Debug, Clone)]
pub struct InlineExtractor<'a> {
    document: &'a Document,
    min_occurrences: usize,
}

impl<'a> InlineExtractor<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            min_occurrences: MIN_OCCURRENCES,
        }
    }

    pub fn from_config(document: &'a Document, config: &ExtractionConfig) -> Self {
        Self::new(document).with_min_occurrences(config.min_occurrences)
    }

    /// Raise the repeat threshold; values below two are ignored
    pub fn with_min_occurrences(mut self, min_occurrences: usize) -> Self {
        self.min_occurrences = min_occurrences.max(MIN_OCCURRENCES);
        self
    }

    /// Every inline shape occurring at least `min_occurrences` times,
    /// in order of first appearance.
    pub fn find_all_inline_schemas(&self) -> Vec<InlineGroup> {
        let mut groups: Vec<InlineGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (owner, schema) in self.document.schemas() {
            let mut finder = InlineFinder::new(owner);
            walk(schema, &mut finder);

            for occurrence in finder.found {
                let key = signature(&occurrence.node, true);
                match index.get(&key).copied() {
                    Some(position) => groups[position].occurrences.push(occurrence),
                    None => {
                        index.insert(key.clone(), groups.len());
                        groups.push(InlineGroup {
                            signature: key,
                            occurrences: vec![occurrence],
                        });
                    }
                }
            }
        }

        groups.retain(|group| group.occurrences.len() >= self.min_occurrences);
        debug!("Found {} repeated inline shapes", groups.len());
        groups
    }

    /// Final name per group (same order as `groups`), with collisions between
    /// different shapes sharing a generated name disambiguated.
    pub fn resolve_names(&self, groups: &[InlineGroup]) -> Vec<String> {
        let bases: Vec<String> = groups
            .iter()
            .map(|group| generate_extracted_name(&group.occurrences))
            .collect();

        let mut by_base: Vec<(&str, Vec<usize>)> = Vec::new();
        for (i, base) in bases.iter().enumerate() {
            match by_base.iter_mut().find(|(name, _)| *name == base.as_str()) {
                Some((_, members)) => members.push(i),
                None => by_base.push((base.as_str(), vec![i])),
            }
        }

        let mut names = bases.clone();
        for (base, members) in by_base.iter().filter(|(_, members)| members.len() > 1) {
            let occurrences: Vec<&[InlineOccurrence]> = members
                .iter()
                .map(|&i| groups[i].occurrences.as_slice())
                .collect();
            for (&i, name) in members.iter().zip(disambiguate(base, &occurrences)) {
                names[i] = name;
            }
        }
        names
    }

    /// New document with every repeated inline shape lifted into a named schema.
    pub fn extract(&self) -> Result<Extraction> {
        let groups = self.find_all_inline_schemas();
        let names = self.resolve_names(&groups);

        let mut order: Vec<usize> = (0..groups.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(groups[i].max_depth()));

        let mut output = self.document.clone();
        let mut stats = ExtractionStats::default();
        let mut pending: Vec<(String, Value)> = Vec::new();
        let mut taken: HashSet<String> = output.schema_names().map(str::to_string).collect();

        for i in order {
            let group = &groups[i];
            let Some(first) = group.occurrences.first() else {
                continue;
            };

            let name = unique_name(&names[i], &taken);
            taken.insert(name.clone());

            // The live body carries references to shapes already lifted from inside it
            let body = output
                .schema(&first.owner)
                .and_then(|schema| first.path.resolve(schema))
                .cloned()
                .unwrap_or_else(|| first.node.clone());

            let reference = output.ref_node(&name);
            let origins = replace_occurrences(&mut output, &group.occurrences, &reference, &mut stats);

            pending.push((name.clone(), body));
            stats.extracted.push(ExtractedSchema { name, origins });
        }

        let schemas = output.schemas_mut();
        for (name, body) in pending {
            schemas.insert(name, body);
        }
        stats.extracted_count = stats.extracted.len();

        info!(
            "Extracted {} inline schemas, replaced {} occurrences ({} skipped)",
            stats.extracted_count, stats.replaced, stats.skipped_occurrences
        );

        output.verify_references("extract", self.document, &RenameMap::new())?;
        Ok(Extraction {
            document: output,
            stats,
        })
    }
}

/// `base`, or `base2`, `base3`, ... if taken
fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|counter| format!("{}{}", base, counter))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

// =============================================================================
// Finder
// =============================================================================

/// Collects inline objects reachable through `properties` and array `items`
/// from one top-level schema.
struct InlineFinder<'o> {
    owner: &'o str,
    /// Nodes whose `properties` are scanned
    containers: HashSet<TreePath>,
    /// Array nodes whose `items` are scanned
    arrays: HashSet<TreePath>,
    found: Vec<InlineOccurrence>,
}

impl<'o> InlineFinder<'o> {
    fn new(owner: &'o str) -> Self {
        Self {
            owner,
            containers: HashSet::new(),
            arrays: HashSet::new(),
            found: Vec::new(),
        }
    }

    fn reachable(&self, path: &TreePath, parent: &TreePath) -> bool {
        if path.is_items_of_schema() {
            self.arrays.contains(parent)
        } else {
            parent.schema_position() == SchemaPosition::Properties
        }
    }
}

impl Visitor for InlineFinder<'_> {
    fn visit(&mut self, path: &TreePath, node: NodeRef<'_>) -> Walk {
        let Some(parent) = path.parent() else {
            self.containers.insert(path.clone());
            return Walk::Descend;
        };

        match path.schema_position() {
            SchemaPosition::Properties if self.containers.contains(&parent) => Walk::Descend,
            SchemaPosition::Schema if self.reachable(path, &parent) => {
                let Some(map) = node.as_object() else {
                    return Walk::Skip;
                };
                if is_inline_object_map(map) {
                    if let Some(property_path) = PropertyPath::from_tree_path(path) {
                        self.found.push(InlineOccurrence {
                            owner: self.owner.to_string(),
                            path: property_path,
                            node: Value::Object(map.clone()),
                        });
                    }
                    self.containers.insert(path.clone());
                    Walk::Descend
                } else if !path.is_items_of_schema() && is_array_schema(map) {
                    self.arrays.insert(path.clone());
                    Walk::Descend
                } else {
                    Walk::Skip
                }
            }
            _ => Walk::Skip,
        }
    }
}

fn is_array_schema(schema: &Map<String, Value>) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("array")
}


/// Point each occurrence at `reference`, returning the `owner.path` origins.
///
/// An occurrence whose owner or path no longer resolves is counted as skipped
/// and left as it is.
fn replace_occurrences(
    output: &mut Document,
    occurrences: &[InlineOccurrence],
    reference: &Value,
    stats: &mut ExtractionStats,
) -> Vec<String> {
    let mut origins = Vec::with_capacity(occurrences.len());
    for occurrence in occurrences {
        origins.push(format!("{}.{}", occurrence.owner, occurrence.path));
        let replaced = output
            .schema_mut(&occurrence.owner)
            .map(|schema| occurrence.path.replace_in(schema, reference.clone()))
            .unwrap_or(false);
        if replaced {
            stats.replaced += 1;
        } else {
            stats.skipped_occurrences += 1;
            debug!(
                "Skipped {}.{}: path no longer resolves",
                occurrence.owner, occurrence.path
            );
        }
    }
    origins
}
