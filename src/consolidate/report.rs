//! Duplicate reports and consolidation statistics

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Duplicate-matching criterion, strictest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// Identical content ignoring key order
    Exact,
    /// Equal signatures including validation constraints
    Structural,
    /// Equal signatures ignoring validation constraints
    StructuralLoose,
    /// Equal (property name, coarse type) sets
    Attribute,
}

impl Fidelity {
    pub const ALL: [Fidelity; 4] = [
        Fidelity::Exact,
        Fidelity::Structural,
        Fidelity::StructuralLoose,
        Fidelity::Attribute,
    ];
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Fidelity::Exact => "exact",
            Fidelity::Structural => "structural",
            Fidelity::StructuralLoose => "structural_loose",
            Fidelity::Attribute => "attribute",
        };
        write!(f, "{}", name)
    }
}

/// Two or more schema names sharing a fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub fidelity: Fidelity,
    /// Fingerprint the members share
    pub key: String,
    /// Members in document order
    pub names: Vec<String>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn member_set(&self) -> BTreeSet<&str> {
        self.names.iter().map(String::as_str).collect()
    }
}

/// Groups found at one level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    /// Number of groups
    pub count: usize,
    /// Schemas across all groups
    pub total_schemas: usize,
    pub groups: Vec<DuplicateGroup>,
}

impl LevelSummary {
    pub fn new(groups: Vec<DuplicateGroup>) -> Self {
        Self {
            count: groups.len(),
            total_schemas: groups.iter().map(DuplicateGroup::len).sum(),
            groups,
        }
    }
}

/// Duplicates at every fidelity level plus the diagnostic sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub exact: LevelSummary,
    pub structural: LevelSummary,
    pub structural_loose: LevelSummary,
    pub attribute: LevelSummary,
    /// Structural groups that are not exact groups (metadata differs)
    pub near_duplicates: LevelSummary,
    /// Loose-structural groups that are not structural groups (constraints differ)
    pub constraint_only: LevelSummary,
}

/// One merged group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedGroup {
    pub canonical: String,
    pub members: Vec<String>,
}

/// Outcome of a consolidation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsolidationStats {
    pub original_count: usize,
    /// Exact-duplicate groups found
    pub duplicate_groups: usize,
    /// Groups actually merged, in processing order
    pub consolidated: Vec<ConsolidatedGroup>,
    /// Names held back by merge exclusions
    pub excluded: Vec<String>,
    /// Schema count after applying the rename map
    pub final_count: usize,
    pub reduction: usize,
}
