//! Generic Tree Walking
//!
//! One pre-order walker over the JSON document tree, shared by every pass that
//! needs to find or rewrite nodes: reference collection, reference rewriting,
//! inline-schema discovery and nullable repair. Visitors see each node as a
//! tagged [`NodeRef`]/[`NodeMut`] together with its [`TreePath`] from the walk
//! root, and decide whether the walker descends into its children.
//!
//! ## Schema positions
//!
//! [`TreePath::schema_position`] classifies a path relative to a walk rooted at a
//! schema node, so passes that only care about sub-schemas (property values,
//! `items`, composition members) can ignore `example`/`default` payloads that
//! merely look like schemas.

use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Paths
// =============================================================================

/// One step from a node to one of its children
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

impl Segment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(key) => Some(key),
            Segment::Index(_) => None,
        }
    }

    fn is_key(&self, name: &str) -> bool {
        self.as_key() == Some(name)
    }
}

/// Location of a node relative to the walk root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TreePath(Vec<Segment>);

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the enclosing node, `None` at the root
    pub fn parent(&self) -> Option<TreePath> {
        if self.0.is_empty() {
            return None;
        }
        Some(TreePath(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn child(&self, segment: Segment) -> TreePath {
        let mut segments = self.0.clone();
        segments.push(segment);
        TreePath(segments)
    }

    fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    fn pop(&mut self) {
        self.0.pop();
    }

    /// Render as a JSON pointer (RFC 6901)
    pub fn to_pointer(&self) -> String {
        let mut out = String::new();
        for segment in &self.0 {
            out.push('/');
            match segment {
                Segment::Key(key) => out.push_str(&key.replace('~', "~0").replace('/', "~1")),
                Segment::Index(index) => out.push_str(&index.to_string()),
            }
        }
        out
    }

    /// Classify this path for a walk rooted at a schema node.
    pub fn schema_position(&self) -> SchemaPosition {
        let mut position = SchemaPosition::Schema;
        for segment in &self.0 {
            position = match (position, segment) {
                (SchemaPosition::Schema, Segment::Key(key)) => match key.as_str() {
                    "properties" => SchemaPosition::Properties,
                    "items" | "additionalProperties" => SchemaPosition::Schema,
                    "allOf" | "oneOf" | "anyOf" => SchemaPosition::Composition,
                    _ => SchemaPosition::Other,
                },
                (SchemaPosition::Properties, Segment::Key(_)) => SchemaPosition::Schema,
                (SchemaPosition::Composition, Segment::Index(_)) => SchemaPosition::Schema,
                _ => SchemaPosition::Other,
            };
            if position == SchemaPosition::Other {
                break;
            }
        }
        position
    }

    /// True when the path ends in `items` taken from a schema node
    pub fn is_items_of_schema(&self) -> bool {
        match (self.last(), self.parent()) {
            (Some(last), Some(parent)) => {
                last.is_key("items") && parent.schema_position() == SchemaPosition::Schema
            }
            _ => false,
        }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pointer())
    }
}

/// Role of a node inside a schema tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPosition {
    /// A schema node (root, property value, `items`, `additionalProperties`, composition member)
    Schema,
    /// The `properties` map of a schema
    Properties,
    /// An `allOf`/`oneOf`/`anyOf` member list
    Composition,
    /// Anything else (examples, defaults, vendor extensions)
    Other,
}

// =============================================================================
// Tagged nodes
// =============================================================================

/// Read-only view of a node
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Object(&'a Map<String, Value>),
    Array(&'a [Value]),
    Scalar(&'a Value),
}

impl<'a> From<&'a Value> for NodeRef<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => NodeRef::Object(map),
            Value::Array(items) => NodeRef::Array(items),
            scalar => NodeRef::Scalar(scalar),
        }
    }
}

impl<'a> NodeRef<'a> {
    pub fn as_object(&self) -> Option<&'a Map<String, Value>> {
        match self {
            NodeRef::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// Mutable view of a node
#[derive(Debug)]
pub enum NodeMut<'a> {
    Object(&'a mut Map<String, Value>),
    Array(&'a mut Vec<Value>),
    Scalar(&'a mut Value),
}

impl<'a> From<&'a mut Value> for NodeMut<'a> {
    fn from(value: &'a mut Value) -> Self {
        match value {
            Value::Object(map) => NodeMut::Object(map),
            Value::Array(items) => NodeMut::Array(items),
            scalar => NodeMut::Scalar(scalar),
        }
    }
}

// =============================================================================
// Visitors
// =============================================================================

/// Whether to walk into the children of the node just visited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Descend,
    Skip,
}

pub trait Visitor {
    fn visit(&mut self, path: &TreePath, node: NodeRef<'_>) -> Walk;
}

pub trait VisitorMut {
    /// Children are walked after the visit, so edits made here are what gets descended into.
    fn visit_mut(&mut self, path: &TreePath, node: NodeMut<'_>) -> Walk;
}

/// Walk `root` pre-order, children in document order.
pub fn walk<V: Visitor + ?Sized>(root: &Value, visitor: &mut V) {
    let mut path = TreePath::root();
    walk_node(root, &mut path, visitor);
}

fn walk_node<V: Visitor + ?Sized>(node: &Value, path: &mut TreePath, visitor: &mut V) {
    if visitor.visit(path, NodeRef::from(node)) == Walk::Skip {
        return;
    }
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(Segment::Key(key.clone()));
                walk_node(child, path, visitor);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(Segment::Index(index));
                walk_node(child, path, visitor);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Mutable counterpart of [`walk`].
pub fn walk_mut<V: VisitorMut + ?Sized>(root: &mut Value, visitor: &mut V) {
    let mut path = TreePath::root();
    walk_node_mut(root, &mut path, visitor);
}

fn walk_node_mut<V: VisitorMut + ?Sized>(node: &mut Value, path: &mut TreePath, visitor: &mut V) {
    if visitor.visit_mut(path, NodeMut::from(&mut *node)) == Walk::Skip {
        return;
    }
    match node {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                path.push(Segment::Key(key.clone()));
                walk_node_mut(child, path, visitor);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                path.push(Segment::Index(index));
                walk_node_mut(child, path, visitor);
                path.pop();
            }
        }
        _ => {}
    }
}
