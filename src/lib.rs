//! OpenAPI Schema Consolidation
//!
//! Shrinks the schema mapping of a generated OpenAPI document by merging
//! schemas that are exact duplicates under one canonical name, and by lifting
//! repeated inline object shapes into shared named schemas. References are
//! rewritten so the document stays self-consistent.
//!
//! ## Features
//!
//! - **Duplicate Analysis**: exact, structural, loose-structural and attribute fingerprints
//! - **Canonical Naming**: ordered pattern registry with an entity-based fallback
//! - **Reference Integrity**: every stage is checked for dangling references
//! - **Inline Extraction**: repeated inline shapes become named schemas, deepest first
//! - **Salvage Loading**: truncated or corrupted inputs fall back to their schema mapping
//!
//! ## Pipeline
//!
//! ```text
//! api.json
//!    │ loader::load_document
//!    ▼
//! Document ──► Consolidator::analyze      (DuplicateReport)
//!    │         Consolidator::consolidate  (RenameMap)
//!    │         Consolidator::apply
//!    ▼
//! fixups::unify_error_responses / fix_nullable_without_type
//!    ▼
//! InlineExtractor::extract
//!    │ loader::save_document
//!    ▼
//! api-final.json
//! ```

pub mod analysis;
pub mod checksum;
pub mod config;
pub mod consolidate;
pub mod document;
pub mod error;
pub mod extract;
pub mod fixups;
pub mod loader;
pub mod pipeline;
pub mod rename;
pub mod tree;

pub use checksum::Checksum;
pub use config::{ConsolidatorConfig, OutputFormat};
pub use consolidate::{Consolidation, Consolidator, DuplicateGroup, DuplicateReport, Fidelity, PatternRegistry};
pub use document::{Document, Operation, Reference};
pub use error::{ConsolidateError, Result};
pub use extract::{Extraction, InlineExtractor, InlineGroup, InlineOccurrence, PropertyPath};
pub use loader::{load_document, save_document, LoadedDocument, Recovery};
pub use pipeline::{Pipeline, PipelineOutput, PipelineReport};
pub use rename::RenameMap;
