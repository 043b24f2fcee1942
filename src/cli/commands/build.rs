//! arec build - Embed a catalog and persist the index

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::catalog::{load_catalog, CatalogRecord, Category};
use crate::cli::output::{emit_human, emit_robot, HumanLayout};
use crate::error::{ArError, Result};
use crate::search::{build_embedder, CatalogIndex};
use crate::storage::Database;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Catalog file (.json, .jsonl or .csv); defaults to catalog.path
    #[arg(long, short)]
    pub catalog: Option<PathBuf>,

    /// Where to write the index (defaults to the --index location)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct BuildReport {
    catalog: PathBuf,
    index: PathBuf,
    records: usize,
    knowledge_skills: usize,
    personality_behavior: usize,
    other: usize,
    timed: usize,
    embedder: String,
    dims: usize,
    render_version: u32,
    fingerprint: String,
    elapsed_ms: u64,
}

pub fn run(ctx: &AppContext, args: &BuildArgs) -> Result<()> {
    let started = Instant::now();
    let catalog_path = args
        .catalog
        .clone()
        .or_else(|| ctx.config.catalog.path.clone())
        .ok_or_else(|| ArError::MissingConfig("catalog.path (or --catalog)".to_string()))?;
    let index_path = args.output.clone().unwrap_or_else(|| ctx.index_path.clone());

    let records = load_catalog(&catalog_path)?;
    if records.is_empty() {
        return Err(ArError::Catalog(format!(
            "{} contains no records",
            catalog_path.display()
        )));
    }

    let embedder = build_embedder(&ctx.config.embedding)?;
    let index = CatalogIndex::build(records, embedder.as_ref())?;

    let mut db = Database::open(&index_path)?;
    db.save_index(&index)?;

    let records = index.records();
    let metadata = index.metadata();
    let report = BuildReport {
        catalog: catalog_path,
        index: index_path,
        records: index.len(),
        knowledge_skills: count_where(records, |c| *c == Category::KnowledgeSkills),
        personality_behavior: count_where(records, |c| *c == Category::PersonalityBehavior),
        other: count_where(records, |c| !c.is_balanced()),
        timed: records
            .iter()
            .filter(|r| r.duration_minutes.is_some())
            .count(),
        embedder: metadata.embedder.clone(),
        dims: metadata.dims,
        render_version: metadata.render_version,
        fingerprint: metadata.fingerprint.clone(),
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        records = report.records,
        elapsed_ms = report.elapsed_ms,
        index = %report.index.display(),
        "index built"
    );

    if ctx.robot_mode {
        return emit_robot(ctx.output_format, &report);
    }

    let mut layout = HumanLayout::for_format(ctx.output_format);
    layout
        .title("Index built")
        .kv("Catalog", &report.catalog.display().to_string())
        .kv("Index", &report.index.display().to_string())
        .kv("Records", &report.records.to_string())
        .kv("Knowledge & Skills", &report.knowledge_skills.to_string())
        .kv("Personality & Beh.", &report.personality_behavior.to_string())
        .kv("Other", &report.other.to_string())
        .kv("With duration", &report.timed.to_string())
        .kv("Embedder", &format!("{} ({} dims)", report.embedder, report.dims))
        .kv("Render version", &report.render_version.to_string())
        .kv("Fingerprint", &report.fingerprint[..12.min(report.fingerprint.len())])
        .kv("Elapsed", &format!("{} ms", report.elapsed_ms));
    emit_human(layout);
    if ctx.output_format.use_colors() {
        println!("\n{}", "Ready to serve: arec serve".green());
    }
    Ok(())
}

fn count_where(records: &[CatalogRecord], wanted: impl Fn(&Category) -> bool) -> usize {
    records.iter().filter(|r| wanted(&r.category)).count()
}
