//! arec health - Report whether a usable index is present
//!
//! Checks the stored index against the configured embedder without
//! building a generation client, so it works offline.

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::catalog::RENDER_VERSION;
use crate::cli::output::{emit_human, emit_robot, HumanLayout};
use crate::error::{ArError, Result, StructuredError};
use crate::search::{build_embedder, IndexMetadata};
use crate::storage::Database;

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Exit non-zero when the index is missing or incompatible
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    ready: bool,
    index_path: String,
    render_version: u32,
    embedder: String,
    dims: usize,
    generator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<IndexMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<StructuredError>,
}

pub fn run(ctx: &AppContext, args: &HealthArgs) -> Result<()> {
    let embedder = build_embedder(&ctx.config.embedding)?;

    let checked = Database::open_existing(&ctx.index_path)
        .and_then(|db| db.load_index())
        .and_then(|index| {
            index.check_compatible(embedder.as_ref())?;
            Ok(index.metadata().clone())
        });
    let (index, problem) = match checked {
        Ok(metadata) => (Some(metadata), None),
        Err(err) if args.strict => return Err(err),
        Err(err) => (None, Some(err)),
    };

    let report = HealthReport {
        ready: problem.is_none(),
        index_path: ctx.index_path.display().to_string(),
        render_version: RENDER_VERSION,
        embedder: embedder.name().to_string(),
        dims: embedder.dims(),
        generator: ctx.config.generation.backend.clone(),
        index,
        problem: problem.as_ref().map(ArError::to_structured),
    };

    if ctx.robot_mode {
        return emit_robot(ctx.output_format, &report);
    }
    emit_human(layout(ctx, &report));
    Ok(())
}

fn layout(ctx: &AppContext, report: &HealthReport) -> HumanLayout {
    let status = match (report.ready, ctx.output_format.use_colors()) {
        (true, true) => "ready".green().to_string(),
        (false, true) => "not ready".red().to_string(),
        (true, false) => "ready".to_string(),
        (false, false) => "not ready".to_string(),
    };

    let mut layout = HumanLayout::for_format(ctx.output_format);
    layout
        .title("arec health")
        .kv("Status", &status)
        .kv("Index", &report.index_path)
        .kv("Embedder", &format!("{} ({} dims)", report.embedder, report.dims))
        .kv("Generator", &report.generator)
        .kv("Render version", &report.render_version.to_string());
    if let Some(index) = &report.index {
        layout
            .kv("Records", &index.records.to_string())
            .kv("Fingerprint", &index.fingerprint)
            .kv("Built", &index.built_at.to_rfc3339());
    }
    if let Some(problem) = &report.problem {
        layout
            .blank()
            .kv("Problem", &problem.message)
            .kv("Suggestion", &problem.suggestion);
    }
    layout
}
