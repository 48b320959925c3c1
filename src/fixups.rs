//! Document repairs applied after consolidation
//!
//! - [`unify_error_responses`] points every error response body at a shared
//!   error schema
//! - [`fix_nullable_without_type`] strips shapes that downstream generators
//!   cannot represent from `nullable` schemas

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::document::{Document, HTTP_METHODS};
use crate::error::Result;
use crate::rename::RenameMap;
use crate::tree::{walk_mut, NodeMut, SchemaPosition, TreePath, VisitorMut, Walk};

const JSON_MEDIA_TYPE: &str = "application/json";

/// Error schema used for each unified status code
pub const STATUS_SCHEMAS: &[(&str, &str)] = &[
    ("400", "BadRequestError"),
    ("401", "UnauthorizedError"),
    ("403", "ForbiddenError"),
    ("404", "NotFoundError"),
    ("500", "InternalServerError"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorUnificationStats {
    pub schemas_added: usize,
    /// Input schemas whose different body was replaced by a shared error schema
    pub schemas_overwritten: Vec<String>,
    /// Responses pointed at a shared schema, per status code
    pub responses_unified: BTreeMap<String, usize>,
    pub total_replaced: usize,
}

// =============================================================================
// Error responses
// =============================================================================

/// Shared error schemas, referencing each other through `ref_prefix`
fn error_schemas(ref_prefix: &str) -> Vec<(&'static str, Value)> {
    vec![
        (
            "BadRequestError",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string"},
                    "statusCode": {"type": "number", "example": 400},
                    "errors": {
                        "type": "array",
                        "items": {"$ref": format!("{}ValidationError", ref_prefix)}
                    }
                },
                "required": ["message", "statusCode", "errors"]
            }),
        ),
        (
            "ValidationError",
            json!({
                "type": "object",
                "properties": {
                    "validation": {"type": "string", "example": "uuid"},
                    "code": {"type": "string", "example": "invalid_string"},
                    "message": {"type": "string", "example": "Invalid uuid"},
                    "path": {"type": "array", "items": {"type": "string"}, "example": ["uuid"]}
                },
                "required": ["validation", "code", "message", "path"]
            }),
        ),
        (
            "UnauthorizedError",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "example": "Unauthorized"},
                    "statusCode": {"type": "number", "example": 401}
                },
                "required": ["message", "statusCode"]
            }),
        ),
        (
            "ForbiddenError",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "example": "Forbidden"},
                    "statusCode": {"type": "number", "example": 403}
                },
                "required": ["message", "statusCode"]
            }),
        ),
        (
            "NotFoundError",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "example": "Not Found"},
                    "statusCode": {"type": "number", "example": 404}
                },
                "required": ["message", "statusCode"]
            }),
        ),
        (
            "InternalServerError",
            json!({
                "type": "object",
                "properties": {
                    "timestamp": {"type": "string"},
                    "path": {"type": "string"},
                    "message": {"type": "string"},
                    "errorCode": {"type": "string"}
                }
            }),
        ),
    ]
}

/// Replace per-operation error bodies with references to shared error schemas.
///
/// A `404` response without content gains a JSON body. Responses that are
/// themselves references are left alone.
pub fn unify_error_responses(document: &Document) -> Result<(Document, ErrorUnificationStats)> {
    let mut output = document.clone();
    let mut stats = ErrorUnificationStats {
        responses_unified: STATUS_SCHEMAS
            .iter()
            .map(|(status, _)| (status.to_string(), 0))
            .collect(),
        ..Default::default()
    };

    let schemas = error_schemas(output.ref_prefix());
    stats.schemas_added = schemas.len();
    for (name, schema) in schemas {
        if let Some(previous) = output.schemas_mut().insert(name.to_string(), schema) {
            if output.schema(name) != Some(&previous) {
                warn!("Replacing existing schema {} with the shared error schema", name);
                stats.schemas_overwritten.push(name.to_string());
            }
        }
    }

    let references: Vec<(&str, Value)> = STATUS_SCHEMAS
        .iter()
        .map(|(status, name)| (*status, output.ref_node(name)))
        .collect();

    for operation in operation_objects(&mut output) {
        let Some(responses) = operation.get_mut("responses").and_then(Value::as_object_mut) else {
            continue;
        };
        for (status, reference) in &references {
            let Some(response) = responses.get_mut(*status).and_then(Value::as_object_mut) else {
                continue;
            };
            if response.contains_key("$ref") {
                continue;
            }

            let unified = if !response.contains_key("content") {
                if *status == "404" {
                    let mut media = Map::new();
                    media.insert("schema".to_string(), reference.clone());
                    let mut content = Map::new();
                    content.insert(JSON_MEDIA_TYPE.to_string(), Value::Object(media));
                    response.insert("content".to_string(), Value::Object(content));
                }
                *status == "404"
            } else {
                match response
                    .get_mut("content")
                    .and_then(|content| content.get_mut(JSON_MEDIA_TYPE))
                    .and_then(Value::as_object_mut)
                {
                    Some(media) => {
                        media.insert("schema".to_string(), reference.clone());
                        true
                    }
                    None => false,
                }
            };

            if unified {
                *stats.responses_unified.entry(status.to_string()).or_insert(0) += 1;
                stats.total_replaced += 1;
            }
        }
    }

    info!(
        "Unified {} error responses across {} shared schemas",
        stats.total_replaced, stats.schemas_added
    );

    output.verify_references("unify_error_responses", document, &RenameMap::new())?;
    Ok((output, stats))
}

/// Mutable operation objects under `paths`, in document order
fn operation_objects(document: &mut Document) -> Vec<&mut Map<String, Value>> {
    let Some(paths) = document.paths_mut() else {
        return Vec::new();
    };
    paths
        .values_mut()
        .filter_map(Value::as_object_mut)
        .flat_map(|item| {
            item.iter_mut()
                .filter(|(method, _)| HTTP_METHODS.contains(&method.as_str()))
                .filter_map(|(_, operation)| operation.as_object_mut())
        })
        .collect()
}

// =============================================================================
// Nullable repair
// =============================================================================

/// Strip `properties` (and an empty `type: object`) from `nullable` schemas
/// that declare no usable shape. Returns the repaired document and the number
/// of nodes changed.
///
/// Covers named schemas plus request and response body schemas.
pub fn fix_nullable_without_type(document: &Document) -> (Document, usize) {
    let mut output = document.clone();
    let mut fixer = NullableFixer { fixed: 0 };

    for schema in output.schemas_mut().values_mut() {
        walk_mut(schema, &mut fixer);
    }

    for operation in operation_objects(&mut output) {
        if let Some(body) = operation.get_mut("requestBody") {
            for schema in content_schemas(body) {
                walk_mut(schema, &mut fixer);
            }
        }
        if let Some(responses) = operation.get_mut("responses").and_then(Value::as_object_mut) {
            for response in responses.values_mut() {
                for schema in content_schemas(response) {
                    walk_mut(schema, &mut fixer);
                }
            }
        }
    }

    info!("Repaired {} nullable schemas without a type", fixer.fixed);
    (output, fixer.fixed)
}

/// `content.*.schema` nodes of a request body or response
fn content_schemas(holder: &mut Value) -> Vec<&mut Value> {
    holder
        .get_mut("content")
        .and_then(Value::as_object_mut)
        .map(|content| {
            content
                .values_mut()
                .filter_map(|media| media.get_mut("schema"))
                .collect()
        })
        .unwrap_or_default()
}

struct NullableFixer {
    fixed: usize,
}

impl NullableFixer {
    fn repair(schema: &mut Map<String, Value>) -> bool {
        if schema.get("nullable") != Some(&Value::Bool(true)) {
            return false;
        }

        if !schema.contains_key("type") && !schema.contains_key("$ref") {
            schema.shift_remove("properties");
            return true;
        }

        let object_type = schema.get("type").and_then(Value::as_str) == Some("object");
        let no_properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .map_or(true, Map::is_empty);
        if object_type && no_properties {
            schema.shift_remove("properties");
            schema.shift_remove("type");
            return true;
        }
        false
    }
}

impl VisitorMut for NullableFixer {
    fn visit_mut(&mut self, path: &TreePath, node: NodeMut<'_>) -> Walk {
        match path.schema_position() {
            SchemaPosition::Schema => {
                if let NodeMut::Object(schema) = node {
                    if Self::repair(schema) {
                        self.fixed += 1;
                    }
                    Walk::Descend
                } else {
                    Walk::Skip
                }
            }
            SchemaPosition::Properties | SchemaPosition::Composition => Walk::Descend,
            SchemaPosition::Other => Walk::Skip,
        }
    }
}
