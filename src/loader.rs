//! Reading and writing API documents
//!
//! Inputs produced by upstream generators are sometimes cut short or carry
//! trailing garbage. Loading falls back through progressively smaller views
//! of the file before giving up:
//!
//! 1. the whole file
//! 2. the prefix ending where the first top-level object closes last
//! 3. only the `"schemas": { ... }` object, as a document with no paths

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::config::OutputFormat;
use crate::document::Document;
use crate::error::{ConsolidateError, Result};

static SCHEMAS_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""schemas"\s*:\s*\{"#).expect("valid schemas section pattern"));

/// How much of the input had to be discarded to load it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Parsed as-is
    None,
    /// Parsed after dropping content past the last balanced top-level object
    Truncated,
    /// Only the schema mapping could be recovered
    SchemasOnly,
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    pub recovery: Recovery,
}

/// Load a document from disk, salvaging what it can from malformed input.
pub fn load_document(path: impl AsRef<Path>) -> Result<LoadedDocument> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConsolidateError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    debug!("Read {} bytes from {}", text.len(), path.display());
    parse_document(&text, path)
}

/// Parse document text; `path` is only used for error messages.
pub fn parse_document(text: &str, path: &Path) -> Result<LoadedDocument> {
    let error = match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            return Ok(LoadedDocument {
                document: Document::from_value(value)?,
                recovery: Recovery::None,
            })
        }
        Err(e) => e,
    };

    if let Some(document) = last_balanced_end(text)
        .and_then(|end| serde_json::from_str::<Value>(&text[..end]).ok())
        .and_then(|value| Document::from_value(value).ok())
    {
        warn!(
            "{} is malformed ({}), loaded truncated document",
            path.display(),
            error
        );
        return Ok(LoadedDocument {
            document,
            recovery: Recovery::Truncated,
        });
    }

    if let Some(schemas) = salvage_schemas(text) {
        warn!(
            "{} is malformed ({}), recovered {} schemas without paths",
            path.display(),
            error,
            schemas.len()
        );
        return Ok(LoadedDocument {
            document: Document::from_schemas(schemas),
            recovery: Recovery::SchemasOnly,
        });
    }

    Err(ConsolidateError::MalformedInput {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })
}

/// Write a document as JSON, creating parent directories as needed.
pub fn save_document(document: &Document, path: impl AsRef<Path>, format: OutputFormat) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let value = document.to_value();
    let content = match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(&value)?,
        OutputFormat::Compact => serde_json::to_string(&value)?,
    };
    fs::write(path, content)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// `api.json` -> `api<suffix>.json`, next to the input
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "openapi".to_string());
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "json".to_string());
    input.with_file_name(format!("{}{}.{}", stem, suffix, extension))
}

// =============================================================================
// Salvage
// =============================================================================

/// Brace scanner that ignores braces inside JSON strings
struct BraceScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl BraceScanner {
    fn new() -> Self {
        Self {
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Feed one byte; returns true when it closes a top-level object
    fn feed(&mut self, byte: u8) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        match byte {
            b'\\' if self.in_string => self.escaped = true,
            b'"' => self.in_string = !self.in_string,
            b'{' if !self.in_string => self.depth += 1,
            b'}' if !self.in_string && self.depth > 0 => {
                self.depth -= 1;
                return self.depth == 0;
            }
            _ => {}
        }
        false
    }
}

/// End offset (exclusive) of the last point where the brace depth returns to zero
fn last_balanced_end(text: &str) -> Option<usize> {
    let mut scanner = BraceScanner::new();
    let mut last = None;
    for (i, byte) in text.bytes().enumerate() {
        if scanner.feed(byte) {
            last = Some(i + 1);
        }
    }
    last
}

/// End offset (exclusive) of the object opening at `start`
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut scanner = BraceScanner::new();
    text.bytes()
        .enumerate()
        .skip(start)
        .find(|&(_, byte)| scanner.feed(byte))
        .map(|(i, _)| i + 1)
}

/// The first `"schemas": { ... }` object in `text`, if it parses
fn salvage_schemas(text: &str) -> Option<Map<String, Value>> {
    let found = SCHEMAS_SECTION.find(text)?;
    let open = found.end() - 1;
    let end = balanced_end(text, open)?;
    match serde_json::from_str::<Value>(&text[open..end]) {
        Ok(Value::Object(schemas)) => Some(schemas),
        _ => None,
    }
}
