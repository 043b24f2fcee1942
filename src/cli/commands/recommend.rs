//! arec recommend - Recommend assessments for a query
//!
//! The query may be free text or a job-description URL. With
//! `--explain-intent` the extracted intent, retrieval hits and balance
//! decision are shown alongside the results.

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::catalog::Category;
use crate::cli::output::{emit_human, emit_robot, HumanLayout, OutputFormat};
use crate::error::Result;
use crate::recommend::RecommendReport;
use crate::rerank::intent::Facet;
use crate::rerank::{BalanceOutcome, QueryIntent, Recommendation};

#[derive(Args, Debug)]
pub struct RecommendArgs {
    /// Query text or job-description URL
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Show the extracted intent and retrieval details
    #[arg(long)]
    pub explain_intent: bool,

    /// Show at most this many recommendations
    #[arg(long, short = 'n')]
    pub top: Option<usize>,
}

pub fn run(ctx: &AppContext, args: &RecommendArgs) -> Result<()> {
    let query = args.query.join(" ");
    let recommender = ctx.load_recommender()?;
    let mut report = recommender.recommend_detailed(&query)?;
    if let Some(top) = args.top {
        report.outcome.recommendations.truncate(top);
    }

    if ctx.robot_mode {
        if args.explain_intent {
            return emit_robot(ctx.output_format, &report);
        }
        return emit_robot(
            ctx.output_format,
            serde_json::json!({
                "query": report.query,
                "source_url": report.source_url,
                "recommendations": report.outcome.recommendations,
            }),
        );
    }

    let mut layout = HumanLayout::for_format(ctx.output_format);
    if args.explain_intent {
        explain(&mut layout, &report);
    }
    recommendations(&mut layout, &report.outcome.recommendations, ctx.output_format);
    emit_human(layout);
    Ok(())
}

fn explain(layout: &mut HumanLayout, report: &RecommendReport) {
    layout.section("Intent");
    if let Some(url) = &report.source_url {
        layout.kv("Fetched from", url);
    }
    describe_intent(layout, &report.outcome.intent);
    layout.blank();

    layout
        .section("Pipeline")
        .kv("Retrieved", &report.retrieved.len().to_string())
        .kv("Over time limit", &report.outcome.filtered_out.to_string())
        .kv("Generator calls", &report.outcome.attempts.to_string())
        .kv("Balance", &balance_label(&report.outcome.balance))
        .kv("Elapsed", &format!("{} ms", report.elapsed_ms));
    layout.blank();
}

fn describe_intent(layout: &mut HumanLayout, intent: &QueryIntent) {
    layout
        .kv("Technical", &labels(&intent.technical_skills))
        .kv("Behavioral", &labels(&intent.behavioral_competencies))
        .kv(
            "Max duration",
            &intent
                .duration_max
                .map_or_else(|| "-".to_string(), |m| format!("{m} minutes")),
        )
        .kv("Job level", intent.job_level.as_deref().unwrap_or("-"));
}

fn labels(facets: &[Facet]) -> String {
    if facets.is_empty() {
        return "-".to_string();
    }
    facets.iter().map(|f| f.label.as_str()).collect::<Vec<_>>().join(", ")
}

fn join(categories: &[Category]) -> String {
    categories
        .iter()
        .map(Category::label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn balance_label(balance: &BalanceOutcome) -> String {
    match balance {
        BalanceOutcome::NotRequired => "not required".to_string(),
        BalanceOutcome::Satisfied => "satisfied".to_string(),
        BalanceOutcome::Repaired(added) => format!("repaired (added {})", join(added)),
        BalanceOutcome::Degraded(missing) => format!("degraded (missing {})", join(missing)),
    }
}

fn recommendations(layout: &mut HumanLayout, recs: &[Recommendation], format: OutputFormat) {
    if recs.is_empty() {
        layout.push_line("No assessments fit this query.");
        return;
    }
    layout.title(&format!("{} recommended assessments", recs.len()));
    for (i, rec) in recs.iter().enumerate() {
        let heading = format!("{}. {}", i + 1, rec.name);
        let heading = if format.use_colors() {
            heading.bold().to_string()
        } else {
            heading
        };
        let duration = rec
            .duration_minutes
            .map_or_else(|| "untimed".to_string(), |m| format!("{m} min"));
        layout
            .push_line(heading)
            .push_line(format!("   {} | {duration}", rec.category.label()))
            .push_line(format!("   {}", rec.url))
            .push_line(format!("   {}", rec.why_fit))
            .blank();
    }
}
