//! Rename mapping produced by consolidation

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping old schema name -> canonical schema name
///
/// Unmapped names resolve to themselves. A canonical name is never itself a key
/// pointing elsewhere, so resolving twice gives the same answer as resolving once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameMap(BTreeMap<String, String>);

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.0.insert(from.into(), to.into());
    }

    /// Canonical name for `name` (identity when unmapped)
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.0.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct canonical names
    pub fn canonical_count(&self) -> usize {
        self.0.values().collect::<BTreeSet<_>>().len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries whose target differs from the key
    pub fn renamed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(from, to)| from != to)
    }
}

impl FromIterator<(String, String)> for RenameMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
