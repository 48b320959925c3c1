//! Sequential stage runner
//!
//! ```text
//! analyze -> consolidate -> apply -> unify errors -> fix nullable -> extract
//! ```
//!
//! Every stage reads the previous stage's output snapshot and produces a new
//! one; the caller's document is never modified.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::ConsolidatorConfig;
use crate::consolidate::{ConsolidationStats, Consolidator, DuplicateReport};
use crate::document::Document;
use crate::error::Result;
use crate::extract::{ExtractionStats, InlineExtractor};
use crate::fixups::{fix_nullable_without_type, unify_error_responses, ErrorUnificationStats};

/// What a pipeline run did
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input_digest: String,
    pub output_digest: String,
    pub input_schemas: usize,
    pub output_schemas: usize,
    pub duplicates: DuplicateReport,
    /// Absent when consolidation is disabled
    pub consolidation: Option<ConsolidationStats>,
    pub error_unification: Option<ErrorUnificationStats>,
    pub nullable_fixed: Option<usize>,
    pub extraction: Option<ExtractionStats>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub document: Document,
    pub report: PipelineReport,
}

/// Runs the enabled stages in order
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: ConsolidatorConfig,
}

impl Pipeline {
    pub fn new(config: ConsolidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsolidatorConfig {
        &self.config
    }

    /// `input` with the configured reference prefix
    fn prepare(&self, input: &Document) -> Document {
        input
            .clone()
            .with_ref_prefix(self.config.document.ref_prefix.clone())
    }

    /// Duplicate report only, no changes
    pub fn analyze(&self, input: &Document) -> Result<DuplicateReport> {
        let document = self.prepare(input);
        let consolidator = Consolidator::from_config(&document, &self.config.consolidation)?;
        Ok(consolidator.analyze())
    }

    pub fn run(&self, input: &Document) -> Result<PipelineOutput> {
        let started_at = Utc::now();
        let mut document = self.prepare(input);
        info!("Pipeline start: {} schemas", document.schema_count());

        let (duplicates, consolidation, merged) = {
            let consolidator = Consolidator::from_config(&document, &self.config.consolidation)?;
            let duplicates = consolidator.analyze();
            if self.config.consolidation.enabled {
                let plan = consolidator.consolidate();
                let merged = if plan.rename_map.is_empty() {
                    None
                } else {
                    Some(consolidator.apply(&plan.rename_map)?)
                };
                (duplicates, Some(plan.stats), merged)
            } else {
                (duplicates, None, None)
            }
        };
        if let Some(merged) = merged {
            document = merged;
        }

        let mut error_unification = None;
        if self.config.fixups.unify_error_responses {
            let (unified, stats) = unify_error_responses(&document)?;
            document = unified;
            error_unification = Some(stats);
        }

        let mut nullable_fixed = None;
        if self.config.fixups.fix_nullable {
            let (fixed, count) = fix_nullable_without_type(&document);
            document = fixed;
            nullable_fixed = Some(count);
        }

        let mut extraction = None;
        if self.config.extraction.enabled {
            let result = InlineExtractor::from_config(&document, &self.config.extraction).extract()?;
            document = result.document;
            extraction = Some(result.stats);
        }

        let report = PipelineReport {
            started_at,
            finished_at: Utc::now(),
            input_digest: input.digest().to_string(),
            output_digest: document.digest().to_string(),
            input_schemas: input.schema_count(),
            output_schemas: document.schema_count(),
            duplicates,
            consolidation,
            error_unification,
            nullable_fixed,
            extraction,
        };
        info!(
            "Pipeline done: {} -> {} schemas",
            report.input_schemas, report.output_schemas
        );

        Ok(PipelineOutput { document, report })
    }
}
