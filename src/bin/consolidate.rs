//! Schema Consolidation CLI
//!
//! Merges duplicate schemas and extracts repeated inline shapes from an
//! OpenAPI document.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use openapi_consolidate::consolidate::LevelSummary;
use openapi_consolidate::loader::default_output_path;
use openapi_consolidate::{load_document, save_document, ConsolidatorConfig, Pipeline, Recovery};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-consolidate")]
#[command(about = "Merge duplicate OpenAPI schemas and extract repeated inline shapes")]
struct Cli {
    /// Input OpenAPI document (JSON)
    input: PathBuf,

    /// Number of groups to list per section
    #[arg(default_value_t = 5)]
    limit: usize,

    /// Output file (default: <input><suffix>.json next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the duplicate analysis and exit without writing
    #[arg(long)]
    analyze_only: bool,

    /// Do not extract inline schemas
    #[arg(long)]
    skip_extraction: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let mut config = ConsolidatorConfig::load_from(config_path.as_deref())
        .context("failed to load configuration")?;
    if cli.skip_extraction {
        config.extraction.enabled = false;
    }

    let loaded = load_document(&cli.input)?;
    match loaded.recovery {
        Recovery::None => {}
        Recovery::Truncated => println!("⚠️  Input was malformed; loaded up to the last complete object"),
        Recovery::SchemasOnly => println!("⚠️  Input was malformed; recovered the schema mapping only"),
    }
    println!("📖 Loaded {} ({} schemas)", cli.input.display(), loaded.document.schema_count());

    let pipeline = Pipeline::new(config);

    if cli.analyze_only {
        let report = pipeline.analyze(&loaded.document)?;
        println!();
        print_level("Exact duplicates", &report.exact, cli.limit);
        print_level("Structural duplicates", &report.structural, cli.limit);
        print_level("Loose structural duplicates", &report.structural_loose, cli.limit);
        print_level("Attribute duplicates", &report.attribute, cli.limit);
        print_level("Near duplicates (metadata differs)", &report.near_duplicates, cli.limit);
        print_level("Constraint-only duplicates", &report.constraint_only, cli.limit);
        if let Some(path) = &cli.report {
            std::fs::write(path, serde_json::to_string_pretty(&report)?)
                .with_context(|| format!("failed to write report {}", path.display()))?;
            println!("📄 Report written to {}", path.display());
        }
        return Ok(());
    }

    let output = pipeline.run(&loaded.document)?;
    let report = &output.report;

    println!();
    if let Some(stats) = &report.consolidation {
        println!(
            "🔗 Merged {} groups: {} -> {} schemas ({} removed)",
            stats.consolidated.len(),
            stats.original_count,
            stats.final_count,
            stats.reduction
        );
        for group in stats.consolidated.iter().take(cli.limit) {
            println!("   {} <- {}", group.canonical, group.members.join(", "));
        }
        if stats.consolidated.len() > cli.limit {
            println!("   ... and {} more", stats.consolidated.len() - cli.limit);
        }
        if !stats.excluded.is_empty() {
            println!("   held back by merge exclusions: {}", stats.excluded.join(", "));
        }
    }
    if let Some(stats) = &report.error_unification {
        println!("🧯 Unified {} error responses", stats.total_replaced);
    }
    if let Some(fixed) = report.nullable_fixed {
        println!("🩹 Repaired {} nullable schemas", fixed);
    }
    if let Some(stats) = &report.extraction {
        println!(
            "📦 Extracted {} inline schemas ({} occurrences replaced, {} skipped)",
            stats.extracted_count, stats.replaced, stats.skipped_occurrences
        );
        for extracted in stats.extracted.iter().take(cli.limit) {
            println!("   {} <- {}", extracted.name, extracted.origins.join(", "));
        }
    }

    let output_path = match &cli.output {
        Some(path) => path.clone(),
        None => default_output_path(&cli.input, &pipeline.config().output.suffix),
    };
    save_document(&output.document, &output_path, pipeline.config().output.format)?;

    if let Some(path) = &cli.report {
        std::fs::write(path, serde_json::to_string_pretty(report)?)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        println!("📄 Report written to {}", path.display());
    }

    println!();
    println!(
        "✅ {} -> {} schemas, written to {}",
        report.input_schemas,
        report.output_schemas,
        output_path.display()
    );
    Ok(())
}

fn print_level(title: &str, level: &LevelSummary, limit: usize) {
    println!("🔍 {}: {} groups, {} schemas", title, level.count, level.total_schemas);
    for group in level.groups.iter().take(limit) {
        println!("   [{}] {}", group.len(), group.names.join(", "));
    }
    if level.count > limit {
        println!("   ... and {} more", level.count - limit);
    }
}
