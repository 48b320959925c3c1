//! The API document being consolidated
//!
//! A [`Document`] owns the whole JSON tree: the named schema mapping under
//! `components.schemas` plus every other location (paths, operations, request
//! and response bodies) that may hold references into it. Map order is the
//! source document's order and is preserved through every transformation.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::checksum::Checksum;
use crate::error::{ConsolidateError, Result};
use crate::rename::RenameMap;
use crate::tree::{walk, walk_mut, NodeMut, NodeRef, Segment, TreePath, Visitor, VisitorMut, Walk};

/// Reference prefix for named schemas in OpenAPI 3 documents
pub const DEFAULT_REF_PREFIX: &str = "#/components/schemas/";

/// HTTP methods recognised as operations under a path item
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

static EMPTY_MAP: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

/// An in-memory API document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Map<String, Value>,
    ref_prefix: String,
}

/// A `$ref` into the schema mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// JSON pointer of the `$ref` member
    pub pointer: String,
    /// Referenced schema name
    pub target: String,
}

/// An operation under `paths`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub path: String,
    pub method: String,
    pub operation_id: Option<String>,
}

impl Operation {
    /// Split an `"<Controller>_<method>"` operation id
    pub fn controller_and_method(&self) -> Option<(&str, &str)> {
        self.operation_id
            .as_deref()?
            .split_once('_')
            .filter(|(controller, method)| !controller.is_empty() && !method.is_empty())
    }
}

impl Document {
    /// Wrap a parsed document, guaranteeing an object at `components.schemas`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut root) = value else {
            return Err(ConsolidateError::InvalidDocument(
                "document root must be a JSON object".to_string(),
            ));
        };

        match root.get("components") {
            None => {}
            Some(Value::Object(components)) => match components.get("schemas") {
                None | Some(Value::Object(_)) => {}
                Some(_) => {
                    return Err(ConsolidateError::InvalidDocument(
                        "components.schemas must be an object".to_string(),
                    ))
                }
            },
            Some(_) => {
                return Err(ConsolidateError::InvalidDocument(
                    "components must be an object".to_string(),
                ))
            }
        }

        let components = object_entry(&mut root, "components");
        object_entry(components, "schemas");

        Ok(Self {
            root,
            ref_prefix: DEFAULT_REF_PREFIX.to_string(),
        })
    }

    /// A document holding only a schema mapping (no paths)
    pub fn from_schemas(schemas: Map<String, Value>) -> Self {
        let mut components = Map::new();
        components.insert("schemas".to_string(), Value::Object(schemas));
        let mut root = Map::new();
        root.insert("components".to_string(), Value::Object(components));
        Self {
            root,
            ref_prefix: DEFAULT_REF_PREFIX.to_string(),
        }
    }

    pub fn with_ref_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ref_prefix = prefix.into();
        self
    }

    pub fn ref_prefix(&self) -> &str {
        &self.ref_prefix
    }

    // =========================================================================
    // Schema mapping
    // =========================================================================

    pub fn schemas(&self) -> &Map<String, Value> {
        self.root
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(Value::as_object)
            .unwrap_or(&EMPTY_MAP)
    }

    pub fn schemas_mut(&mut self) -> &mut Map<String, Value> {
        let components = object_entry(&mut self.root, "components");
        object_entry(components, "schemas")
    }

    /// Replace the whole schema mapping, keeping its slot in `components`
    pub fn set_schemas(&mut self, schemas: Map<String, Value>) {
        *self.schemas_mut() = schemas;
    }

    pub fn schema(&self, name: &str) -> Option<&Value> {
        self.schemas().get(name)
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.schemas_mut().get_mut(name)
    }

    pub fn schema_count(&self) -> usize {
        self.schemas().len()
    }

    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schemas().keys().map(String::as_str)
    }

    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths").and_then(Value::as_object)
    }

    pub fn paths_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.root.get_mut("paths").and_then(Value::as_object_mut)
    }

    // =========================================================================
    // References
    // =========================================================================

    /// Reference string pointing at schema `name`
    pub fn ref_to(&self, name: &str) -> String {
        format!("{}{}", self.ref_prefix, name)
    }

    /// A `$ref` object pointing at schema `name`
    pub fn ref_node(&self, name: &str) -> Value {
        let mut node = Map::new();
        node.insert("$ref".to_string(), Value::String(self.ref_to(name)));
        Value::Object(node)
    }

    /// Schema name a reference string points at, if it targets the schema mapping
    pub fn ref_target<'a>(&self, reference: &'a str) -> Option<&'a str> {
        reference.strip_prefix(self.ref_prefix.as_str())
    }

    /// Every reference into the schema mapping, in document order
    pub fn references(&self) -> Vec<Reference> {
        let mut collector = RefCollector {
            prefix: &self.ref_prefix,
            found: Vec::new(),
        };
        let root = Value::Object(self.root.clone());
        walk(&root, &mut collector);
        collector.found
    }

    /// References whose target is absent from the schema mapping
    pub fn dangling_references(&self) -> Vec<Reference> {
        let schemas = self.schemas();
        self.references()
            .into_iter()
            .filter(|r| !schemas.contains_key(&r.target))
            .collect()
    }

    /// Fail if this document has dangling references that `input` did not have.
    ///
    /// Targets already dangling in `input` are carried through `renames` and
    /// tolerated, so breakage in the source document is not blamed on `stage`.
    pub fn verify_references(
        &self,
        stage: &'static str,
        input: &Document,
        renames: &RenameMap,
    ) -> Result<()> {
        let preexisting: HashSet<String> = input
            .dangling_references()
            .into_iter()
            .map(|r| renames.resolve(&r.target).to_string())
            .collect();

        let introduced: Vec<String> = self
            .dangling_references()
            .into_iter()
            .filter(|r| !preexisting.contains(&r.target))
            .map(|r| format!("{} -> {}", r.pointer, r.target))
            .collect();

        if introduced.is_empty() {
            Ok(())
        } else {
            Err(ConsolidateError::DanglingReferences {
                stage,
                references: introduced,
            })
        }
    }

    /// Point every reference at its canonical name. Returns the number rewritten.
    pub fn rewrite_refs(&mut self, renames: &RenameMap) -> usize {
        if renames.is_empty() {
            return 0;
        }
        let mut rewriter = RefRewriter {
            prefix: &self.ref_prefix,
            renames,
            rewritten: 0,
        };
        let mut root = Value::Object(std::mem::take(&mut self.root));
        walk_mut(&mut root, &mut rewriter);
        let rewritten = rewriter.rewritten;
        if let Value::Object(map) = root {
            self.root = map;
        }
        rewritten
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Operations under `paths`, in document order
    pub fn operations(&self) -> Vec<Operation> {
        let Some(paths) = self.paths() else {
            return Vec::new();
        };
        let mut operations = Vec::new();
        for (path, item) in paths {
            let Some(item) = item.as_object() else {
                continue;
            };
            for (method, op) in item {
                if !HTTP_METHODS.contains(&method.as_str()) || !op.is_object() {
                    continue;
                }
                operations.push(Operation {
                    path: path.clone(),
                    method: method.clone(),
                    operation_id: op
                        .get("operationId")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
            }
        }
        operations
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Canonical digest of the whole document
    pub fn digest(&self) -> Checksum {
        Checksum::from_json(&self.to_value())
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }
}

/// Get `map[key]` as an object, replacing a missing or non-object slot.
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(inner) => inner,
        _ => unreachable!("slot holds an object"),
    }
}

// =============================================================================
// Visitors
// =============================================================================

struct RefCollector<'p> {
    prefix: &'p str,
    found: Vec<Reference>,
}

impl Visitor for RefCollector<'_> {
    fn visit(&mut self, path: &TreePath, node: NodeRef<'_>) -> Walk {
        if let NodeRef::Object(map) = node {
            if let Some(target) = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix(self.prefix))
            {
                self.found.push(Reference {
                    pointer: path.child(Segment::Key("$ref".to_string())).to_pointer(),
                    target: target.to_string(),
                });
            }
        }
        Walk::Descend
    }
}

struct RefRewriter<'a> {
    prefix: &'a str,
    renames: &'a RenameMap,
    rewritten: usize,
}

impl VisitorMut for RefRewriter<'_> {
    fn visit_mut(&mut self, _path: &TreePath, node: NodeMut<'_>) -> Walk {
        if let NodeMut::Object(map) = node {
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                let renamed = reference
                    .strip_prefix(self.prefix)
                    .and_then(|name| self.renames.get(name))
                    .map(|canonical| format!("{}{}", self.prefix, canonical));
                if let Some(renamed) = renamed {
                    if *reference != renamed {
                        *reference = renamed;
                        self.rewritten += 1;
                    }
                }
            }
        }
        Walk::Descend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        Document::from_value(json!({
            "openapi": "3.0.0",
            "paths": {
                "/users": {
                    "get": {
                        "operationId": "UsersController_getAllUsers",
                        "responses": {
                            "200": {"content": {"application/json": {"schema": {"$ref": "#/components/schemas/UserB"}}}}
                        }
                    },
                    "parameters": []
                }
            },
            "components": {
                "schemas": {
                    "UserA": {"type": "object", "properties": {"id": {"type": "string"}}},
                    "UserB": {"type": "object", "properties": {"id": {"type": "string"}}},
                    "Holder": {
                        "type": "object",
                        "properties": {
                            "nested": {"oneOf": [{"type": "array", "items": [{"$ref": "#/components/schemas/UserB"}]}]}
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_from_value_inserts_schemas() {
        let doc = Document::from_value(json!({"openapi": "3.0.0"})).unwrap();
        assert_eq!(doc.schema_count(), 0);
        assert_eq!(doc.to_value()["components"]["schemas"], json!({}));
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(matches!(
            Document::from_value(json!([1, 2])),
            Err(ConsolidateError::InvalidDocument(_))
        ));
        assert!(matches!(
            Document::from_value(json!({"components": {"schemas": []}})),
            Err(ConsolidateError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_schema_order_is_preserved() {
        let doc = sample();
        let names: Vec<&str> = doc.schema_names().collect();
        assert_eq!(names, vec!["UserA", "UserB", "Holder"]);
    }

    #[test]
    fn test_references_found_in_nested_lists() {
        let doc = sample();
        let refs = doc.references();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.target == "UserB"));
        assert!(refs
            .iter()
            .any(|r| r.pointer == "/components/schemas/Holder/properties/nested/oneOf/0/items/0/$ref"));
    }

    #[test]
    fn test_rewrite_refs() {
        let mut doc = sample();
        let mut renames = RenameMap::new();
        renames.insert("UserA", "UserA");
        renames.insert("UserB", "UserA");
        assert_eq!(doc.rewrite_refs(&renames), 2);
        assert!(doc.references().iter().all(|r| r.target == "UserA"));
        // Second pass has nothing left to change
        assert_eq!(doc.rewrite_refs(&renames), 0);
    }

    #[test]
    fn test_dangling_references() {
        let mut doc = sample();
        doc.schemas_mut().shift_remove("UserB");
        assert_eq!(doc.dangling_references().len(), 2);
    }

    #[test]
    fn test_verify_references_ignores_preexisting_breakage() {
        let mut input = sample();
        input.schemas_mut().insert(
            "Broken".to_string(),
            json!({"$ref": "#/components/schemas/Missing"}),
        );
        let output = input.clone();
        assert!(output.verify_references("apply", &input, &RenameMap::new()).is_ok());

        let mut broken = input.clone();
        broken.schemas_mut().shift_remove("UserB");
        match broken.verify_references("apply", &input, &RenameMap::new()) {
            Err(ConsolidateError::DanglingReferences { stage, references }) => {
                assert_eq!(stage, "apply");
                assert_eq!(references.len(), 2);
            }
            other => panic!("Expected DanglingReferences, got {:?}", other),
        }
    }

    #[test]
    fn test_external_refs_are_ignored() {
        let doc = Document::from_value(json!({
            "components": {"schemas": {"A": {"$ref": "other.json#/A"}}}
        }))
        .unwrap();
        assert!(doc.references().is_empty());
    }

    #[test]
    fn test_operations() {
        let doc = sample();
        let ops = doc.operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].method, "get");
        assert_eq!(ops[0].controller_and_method(), Some(("UsersController", "getAllUsers")));
    }

    #[test]
    fn test_from_schemas_has_no_paths() {
        let mut schemas = Map::new();
        schemas.insert("A".to_string(), json!({"type": "string"}));
        let doc = Document::from_schemas(schemas);
        assert!(doc.paths().is_none());
        assert!(doc.operations().is_empty());
        assert_eq!(doc.ref_to("A"), "#/components/schemas/A");
    }

    #[test]
    fn test_digest_ignores_key_order() {
        let first = Document::from_value(json!({"a": 1, "components": {"schemas": {}}})).unwrap();
        let second = Document::from_value(json!({"components": {"schemas": {}}, "a": 1})).unwrap();
        assert_eq!(first.digest(), second.digest());
    }
}
