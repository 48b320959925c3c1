//! Configuration management for the consolidation engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (consolidate.toml)
//! - Environment variables (CONSOLIDATE__*)
//!
//! ## Example config file (consolidate.toml):
//! ```toml
//! [document]
//! ref_prefix = "#/components/schemas/"
//!
//! [consolidation]
//! enabled = true
//! name_threshold = 0.5
//! merge_exclusions = [
//!     ["CreateExternalSquadRequestDto", "CreateSubscriptionPageConfigRequestDto"],
//! ]
//!
//! [[consolidation.extra_pattern_groups]]
//! canonical = "AuditLogResponse"
//! patterns = ['^GetAuditLog\w*Response']
//!
//! [extraction]
//! enabled = true
//! min_occurrences = 2
//!
//! [fixups]
//! unify_error_responses = true
//! fix_nullable = false
//!
//! [output]
//! format = "pretty"
//! suffix = "-final"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::document::DEFAULT_REF_PREFIX;

/// Main configuration for a consolidation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsolidatorConfig {
    /// Document conventions
    #[serde(default)]
    pub document: DocumentConfig,

    /// Duplicate merging
    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    /// Inline schema extraction
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Document repairs run between stages
    #[serde(default)]
    pub fixups: FixupConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Document conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Prefix of references into the schema mapping
    #[serde(default = "default_ref_prefix")]
    pub ref_prefix: String,
}

/// Duplicate merging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum pattern-group score for a registry name to be chosen
    #[serde(default = "default_name_threshold")]
    pub name_threshold: f64,

    /// Name sets that must never share a canonical name
    #[serde(default = "default_merge_exclusions")]
    pub merge_exclusions: Vec<Vec<String>>,

    /// Pattern groups evaluated before the built-in registry
    #[serde(default)]
    pub extra_pattern_groups: Vec<PatternGroupConfig>,
}

/// A configured naming pattern group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternGroupConfig {
    /// Canonical name returned when the group wins
    pub canonical: String,
    /// Regular expressions matched against Dto-stripped schema names
    pub patterns: Vec<String>,
}

/// Inline extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Occurrences a shape needs before it is promoted
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,
}

/// Document repairs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixupConfig {
    /// Replace 4xx/5xx bodies with shared error schemas
    #[serde(default = "default_true")]
    pub unify_error_responses: bool,

    /// Strip shapes from `nullable` schemas that have no usable type
    #[serde(default)]
    pub fix_nullable: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub format: OutputFormat,

    /// Suffix appended to the input file stem when no output path is given
    #[serde(default = "default_output_suffix")]
    pub suffix: String,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_ref_prefix() -> String {
    DEFAULT_REF_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

fn default_name_threshold() -> f64 {
    0.5
}

fn default_merge_exclusions() -> Vec<Vec<String>> {
    vec![vec![
        "CreateExternalSquadRequestDto".to_string(),
        "CreateSubscriptionPageConfigRequestDto".to_string(),
    ]]
}

fn default_min_occurrences() -> usize {
    2
}

fn default_output_suffix() -> String {
    "-final".to_string()
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            ref_prefix: default_ref_prefix(),
        }
    }
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name_threshold: default_name_threshold(),
            merge_exclusions: default_merge_exclusions(),
            extra_pattern_groups: Vec::new(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_occurrences: default_min_occurrences(),
        }
    }
}

impl Default for FixupConfig {
    fn default() -> Self {
        Self {
            unify_error_responses: true,
            fix_nullable: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Pretty,
            suffix: default_output_suffix(),
        }
    }
}

impl ConsolidatorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["consolidate.toml", ".consolidate.toml", "config/consolidate.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "openapi-consolidate") {
            let xdg_config = config_dir.config_dir().join("consolidate.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
        }

        // Load from environment variables (CONSOLIDATE__SECTION__KEY)
        builder = builder.add_source(
            Environment::with_prefix("CONSOLIDATE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConsolidatorConfig::default();
        assert!(config.consolidation.enabled);
        assert_eq!(config.consolidation.name_threshold, 0.5);
        assert_eq!(config.consolidation.merge_exclusions.len(), 1);
        assert_eq!(config.extraction.min_occurrences, 2);
        assert!(config.fixups.unify_error_responses);
        assert!(!config.fixups.fix_nullable);
        assert_eq!(config.document.ref_prefix, "#/components/schemas/");
        assert_eq!(config.output.suffix, "-final");
    }

    #[test]
    fn test_serialize_config() {
        let config = ConsolidatorConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[consolidation]"));
        assert!(toml_str.contains("[extraction]"));
        assert!(toml_str.contains("format = \"pretty\""));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ConsolidatorConfig = toml::from_str(
            r#"
            [extraction]
            enabled = false

            [[consolidation.extra_pattern_groups]]
            canonical = "AuditLogResponse"
            patterns = ['^GetAuditLog\w*Response']
            "#,
        )
        .unwrap();
        assert!(!config.extraction.enabled);
        assert_eq!(config.extraction.min_occurrences, 2);
        assert_eq!(config.consolidation.extra_pattern_groups.len(), 1);
        assert_eq!(config.consolidation.merge_exclusions.len(), 1);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[output]\nformat = \"compact\"\n").unwrap();

        let config = ConsolidatorConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.output.format, OutputFormat::Compact);
    }

    #[test]
    fn test_load_from_missing_explicit_file_fails() {
        assert!(ConsolidatorConfig::load_from(Some("/nonexistent/consolidate.toml")).is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = ConsolidatorConfig::default();
        config.extraction.min_occurrences = 3;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded: ConsolidatorConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.extraction.min_occurrences, 3);
    }
}
