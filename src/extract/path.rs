//! Property paths inside a schema
//!
//! A path names a nested inline node by the property names leading to it,
//! joined with `.`, with `[]` stepping into an array's `items`:
//! `response.users[].settings` is
//! `properties.response.properties.users.items.properties.settings`.

use serde_json::Value;
use std::fmt;

use crate::tree::{Segment, TreePath};

/// One step of a [`PropertyPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    /// `properties[name]`
    Property(String),
    /// `items`
    Items,
}

/// Dotted/bracketed path from a schema root to a nested node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath(Vec<PathStep>);

impl PropertyPath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    /// Parse `a.b[].c`; empty segments are ignored
    pub fn parse(path: &str) -> Self {
        let steps = path
            .replace("[]", ".[]")
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| match part {
                "[]" => PathStep::Items,
                name => PathStep::Property(name.to_string()),
            })
            .collect();
        Self(steps)
    }

    /// Property path of a tree location inside a schema, if the location is
    /// reached only through `properties` members and `items`.
    pub fn from_tree_path(path: &TreePath) -> Option<Self> {
        let mut steps = Vec::new();
        let mut segments = path.segments().iter();
        while let Some(segment) = segments.next() {
            match segment.as_key()? {
                "properties" => match segments.next()? {
                    Segment::Key(name) => steps.push(PathStep::Property(name.clone())),
                    Segment::Index(_) => return None,
                },
                "items" => steps.push(PathStep::Items),
                _ => return None,
            }
        }
        Some(Self(steps))
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Separators plus array markers
    pub fn depth(&self) -> usize {
        let properties = self
            .0
            .iter()
            .filter(|step| matches!(step, PathStep::Property(_)))
            .count();
        let items = self.0.len() - properties;
        properties.saturating_sub(1) + items
    }

    /// Path contains an array step
    pub fn is_array(&self) -> bool {
        self.0.contains(&PathStep::Items)
    }

    /// Path ends at array items
    pub fn is_array_item(&self) -> bool {
        self.0.last() == Some(&PathStep::Items)
    }

    /// Last property name on the path
    pub fn last_property(&self) -> Option<&str> {
        self.0.iter().rev().find_map(|step| match step {
            PathStep::Property(name) => Some(name.as_str()),
            PathStep::Items => None,
        })
    }

    /// Node at this path under `schema`
    pub fn resolve<'a>(&self, schema: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(schema, |current, step| match step {
            PathStep::Items => current.get("items"),
            PathStep::Property(name) => current.get("properties")?.get(name),
        })
    }

    /// Replace the node at this path. Returns false when any step is missing.
    pub fn replace_in(&self, schema: &mut Value, replacement: Value) -> bool {
        let Some((last, parents)) = self.0.split_last() else {
            return false;
        };

        let mut current = schema;
        for step in parents {
            let next = match step {
                PathStep::Items => current.get_mut("items"),
                PathStep::Property(name) => current
                    .get_mut("properties")
                    .and_then(|properties| properties.get_mut(name)),
            };
            match next {
                Some(next) => current = next,
                None => return false,
            }
        }

        match last {
            PathStep::Items => match current.as_object_mut() {
                Some(node) if node.contains_key("items") => {
                    node.insert("items".to_string(), replacement);
                    true
                }
                _ => false,
            },
            PathStep::Property(name) => {
                match current.get_mut("properties").and_then(Value::as_object_mut) {
                    Some(properties) if properties.contains_key(name) => {
                        properties.insert(name.clone(), replacement);
                        true
                    }
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for step in &self.0 {
            match step {
                PathStep::Items => write!(f, "[]")?,
                PathStep::Property(name) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", name)?;
                }
            }
            first = false;
        }
        Ok(())
    }
}
