//! Structural Fingerprints
//!
//! Signatures render only the structural fields of a schema node in a fixed
//! order, so metadata (`description`, `example`, `title`, `default`,
//! `deprecated`) never influences equality while every structural field does.
//! Property maps, `required` lists, `enum` values and composition members are
//! sorted before rendering, making signatures insensitive to declaration order.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::checksum::canonical_json;

/// Validation keywords included when constraints are part of the fingerprint
pub const CONSTRAINT_KEYWORDS: &[&str] = &[
    "minLength",
    "maxLength",
    "minimum",
    "maximum",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
];

const COMPOSITION_KEYWORDS: &[&str] = &["allOf", "oneOf", "anyOf"];

// =============================================================================
// Signatures
// =============================================================================

/// Structural signature of a schema node.
///
/// Two nodes have equal signatures exactly when they are structurally
/// equivalent at the chosen fidelity.
pub fn signature(node: &Value, include_constraints: bool) -> String {
    let Value::Object(schema) = node else {
        return render_scalar(node);
    };

    let mut parts: Vec<String> = Vec::new();

    for (keyword, label) in [("type", "type"), ("format", "format"), ("$ref", "ref")] {
        if let Some(value) = schema.get(keyword) {
            parts.push(format!("{}={}", label, render_scalar(value)));
        }
    }

    if include_constraints {
        for keyword in CONSTRAINT_KEYWORDS {
            if let Some(value) = schema.get(*keyword) {
                parts.push(format!("{}={}", keyword, render_scalar(value)));
            }
        }
    }

    if let Some(properties) = schema.get("properties") {
        parts.push(format!("props=[{}]", properties_signature(properties, include_constraints)));
    }

    if let Some(required) = schema.get("required") {
        parts.push(format!("req={}", sorted_list(required)));
    }

    if let Some(values) = schema.get("enum") {
        parts.push(format!("enum={}", sorted_list(values)));
    }

    if let Some(items) = schema.get("items") {
        parts.push(format!("items={}", signature(items, include_constraints)));
    }

    for keyword in COMPOSITION_KEYWORDS {
        if let Some(members) = schema.get(*keyword) {
            let mut signatures: Vec<String> = match members {
                Value::Array(members) => members
                    .iter()
                    .map(|member| signature(member, include_constraints))
                    .collect(),
                other => vec![signature(other, include_constraints)],
            };
            signatures.sort();
            parts.push(format!("{}=[{}]", keyword, signatures.join(";")));
        }
    }

    if let Some(additional) = schema.get("additionalProperties") {
        parts.push(format!("addProps={}", signature(additional, include_constraints)));
    }

    parts.join("|")
}

fn properties_signature(properties: &Value, include_constraints: bool) -> String {
    let Value::Object(properties) = properties else {
        return render_scalar(properties);
    };
    let mut names: Vec<&String> = properties.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let property = &properties[name.as_str()];
            let nullable = property
                .get("nullable")
                .map(render_scalar)
                .unwrap_or_else(|| "false".to_string());
            format!("{}:{}:n={}", name, signature(property, include_constraints), nullable)
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Render a list's elements as strings, sorted
fn sorted_list(value: &Value) -> String {
    let mut rendered: Vec<String> = match value {
        Value::Array(items) => items.iter().map(render_scalar).collect(),
        other => vec![render_scalar(other)],
    };
    rendered.sort();
    format!("[{}]", rendered.join(","))
}

/// Strings render bare, everything else as canonical JSON
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => canonical_json(other),
    }
}

// =============================================================================
// Attribute Shapes
// =============================================================================

/// Coarse kind of a property for attribute-shape comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoarseType {
    /// The property's declared `type`
    Declared(String),
    /// A `$ref` without a declared type
    Ref,
    /// Neither
    Unknown,
}

impl CoarseType {
    pub fn of(property: &Value) -> Self {
        match property.get("type") {
            Some(Value::String(t)) => CoarseType::Declared(t.clone()),
            Some(other) => CoarseType::Declared(canonical_json(other)),
            None if property.get("$ref").is_some() => CoarseType::Ref,
            None => CoarseType::Unknown,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CoarseType::Declared(t) => t,
            CoarseType::Ref => "ref",
            CoarseType::Unknown => "unknown",
        }
    }
}

impl Serialize for CoarseType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One (property name, coarse type) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Attribute {
    pub name: String,
    pub kind: CoarseType,
}

/// Set of attributes of a schema's direct properties
pub type AttributeShape = BTreeSet<Attribute>;

/// Attribute shape of a schema node (empty for nodes without properties)
pub fn attribute_shape(node: &Value) -> AttributeShape {
    node.get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| Attribute {
                    name: name.clone(),
                    kind: CoarseType::of(property),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Stable string key for an attribute shape
pub fn attribute_key(shape: &AttributeShape) -> String {
    shape
        .iter()
        .map(|attr| format!("{}:{}", attr.name, attr.kind.as_str()))
        .collect::<Vec<_>>()
        .join(";")
}

// =============================================================================
// Pairwise Comparison
// =============================================================================

/// Similarity of two schema nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Identical content, ignoring key order
    pub exact_match: bool,
    /// Equal signatures with constraints
    pub structural_match: bool,
    /// Jaccard similarity of attribute shapes
    pub attribute_jaccard: f64,
    /// Attributes present only in the second node
    pub missing_in_first: AttributeShape,
    /// Attributes present only in the first node
    pub missing_in_second: AttributeShape,
}

/// Compare two schema nodes at every fidelity
pub fn compare(first: &Value, second: &Value) -> Comparison {
    let exact_match = canonical_json(first) == canonical_json(second);
    let structural_match = signature(first, true) == signature(second, true);

    let first_attrs = attribute_shape(first);
    let second_attrs = attribute_shape(second);

    let attribute_jaccard = if first_attrs.is_empty() && second_attrs.is_empty() {
        if exact_match {
            1.0
        } else {
            0.0
        }
    } else {
        let intersection = first_attrs.intersection(&second_attrs).count();
        let union = first_attrs.union(&second_attrs).count();
        intersection as f64 / union as f64
    };

    Comparison {
        exact_match,
        structural_match,
        attribute_jaccard,
        missing_in_first: second_attrs.difference(&first_attrs).cloned().collect(),
        missing_in_second: first_attrs.difference(&second_attrs).cloned().collect(),
    }
}

/// True for `type: object` nodes with at least one property
pub fn is_inline_object(node: &Value) -> bool {
    node.as_object().is_some_and(is_inline_object_map)
}

/// [`is_inline_object`] for a node already known to be an object
pub fn is_inline_object_map(schema: &Map<String, Value>) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("object")
        && schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|properties| !properties.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_does_not_affect_signature() {
        let first = json!({
            "type": "object",
            "description": "A user",
            "title": "User",
            "properties": {"id": {"type": "string", "example": "abc", "description": "id"}}
        });
        let second = json!({
            "type": "object",
            "deprecated": true,
            "properties": {"id": {"type": "string", "default": "x"}}
        });
        assert_eq!(signature(&first, true), signature(&second, true));
        assert_eq!(signature(&first, false), signature(&second, false));
    }

    #[test]
    fn test_constraints_only_count_when_included() {
        let first = json!({"type": "string", "minLength": 1});
        let second = json!({"type": "string", "minLength": 2});
        assert_eq!(signature(&first, false), signature(&second, false));
        assert_ne!(signature(&first, true), signature(&second, true));
    }

    #[test]
    fn test_property_order_does_not_matter() {
        let first = json!({"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "integer"}}});
        let second = json!({"type": "object", "properties": {"b": {"type": "integer"}, "a": {"type": "string"}}});
        assert_eq!(signature(&first, true), signature(&second, true));
    }

    #[test]
    fn test_composition_member_order_does_not_matter() {
        for keyword in ["allOf", "oneOf", "anyOf"] {
            let first = json!({keyword: [{"type": "string"}, {"$ref": "#/components/schemas/A"}]});
            let second = json!({keyword: [{"$ref": "#/components/schemas/A"}, {"type": "string"}]});
            assert_eq!(signature(&first, true), signature(&second, true), "{}", keyword);
        }
    }

    #[test]
    fn test_required_and_enum_are_order_insensitive() {
        let first = json!({"type": "object", "required": ["a", "b"], "enum": ["x", 1]});
        let second = json!({"type": "object", "required": ["b", "a"], "enum": [1, "x"]});
        assert_eq!(signature(&first, true), signature(&second, true));
    }

    #[test]
    fn test_structural_fields_change_signature() {
        let base = json!({"type": "object", "properties": {"a": {"type": "string"}}});
        let variants = [
            json!({"type": "object", "properties": {"a": {"type": "string", "format": "uuid"}}}),
            json!({"type": "object", "properties": {"a": {"type": "string", "nullable": true}}}),
            json!({"type": "object", "properties": {"a": {"type": "string"}}, "required": ["a"]}),
            json!({"type": "object", "properties": {"a": {"type": "string"}}, "additionalProperties": false}),
            json!({"type": "object", "properties": {"a": {"$ref": "#/components/schemas/A"}}}),
        ];
        for variant in variants {
            assert_ne!(signature(&base, false), signature(&variant, false), "{}", variant);
        }
    }

    #[test]
    fn test_signature_shape() {
        let node = json!({
            "type": "array",
            "minItems": 1,
            "items": {"type": "object", "properties": {"id": {"type": "string"}}}
        });
        assert_eq!(
            signature(&node, true),
            "type=array|minItems=1|items=type=object|props=[id:type=string:n=false]"
        );
        assert_eq!(signature(&json!(true), true), "true");
    }

    #[test]
    fn test_attribute_shape_kinds() {
        let node = json!({
            "properties": {
                "id": {"type": "string"},
                "owner": {"$ref": "#/components/schemas/User"},
                "extra": {"description": "anything"}
            }
        });
        let shape = attribute_shape(&node);
        let kinds: Vec<(&str, &str)> = shape.iter().map(|a| (a.name.as_str(), a.kind.as_str())).collect();
        assert_eq!(kinds, vec![("extra", "unknown"), ("id", "string"), ("owner", "ref")]);
        assert_eq!(attribute_key(&shape), "extra:unknown;id:string;owner:ref");
    }

    #[test]
    fn test_compare_partial_overlap() {
        let first = json!({"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "string"}}});
        let second = json!({"type": "object", "properties": {"a": {"type": "string"}, "c": {"type": "string"}}});
        let result = compare(&first, &second);
        assert!(!result.exact_match);
        assert!(!result.structural_match);
        assert!((result.attribute_jaccard - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.missing_in_first.len(), 1);
        assert_eq!(result.missing_in_first.iter().next().unwrap().name, "c");
        assert_eq!(result.missing_in_second.iter().next().unwrap().name, "b");
    }

    #[test]
    fn test_compare_without_attributes() {
        let first = json!({"type": "string"});
        assert_eq!(compare(&first, &json!({"type": "string"})).attribute_jaccard, 1.0);
        assert_eq!(compare(&first, &json!({"type": "integer"})).attribute_jaccard, 0.0);

        let reordered = compare(&json!({"type": "string", "format": "uuid"}), &json!({"format": "uuid", "type": "string"}));
        assert!(reordered.exact_match);
        assert!(reordered.structural_match);
    }

    #[test]
    fn test_is_inline_object() {
        assert!(is_inline_object(&json!({"type": "object", "properties": {"a": {}}})));
        assert!(!is_inline_object(&json!({"type": "object", "properties": {}})));
        assert!(!is_inline_object(&json!({"properties": {"a": {}}})));
        assert!(!is_inline_object(&json!({"$ref": "#/components/schemas/A"})));
    }
}
