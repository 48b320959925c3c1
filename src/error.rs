//! Error types for the consolidation engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for consolidation operations
pub type Result<T> = std::result::Result<T, ConsolidateError>;

/// Consolidation engine errors
#[derive(Error, Debug)]
pub enum ConsolidateError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Malformed input {}: {reason}", path.display())]
    MalformedInput { path: PathBuf, reason: String },

    #[error("Reference integrity violated after {stage}: {} dangling reference(s), first: {}", references.len(), references.first().map(String::as_str).unwrap_or("-"))]
    DanglingReferences {
        stage: &'static str,
        references: Vec<String>,
    },

    #[error("Invalid naming pattern for {canonical}: {source}")]
    InvalidPattern {
        canonical: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
