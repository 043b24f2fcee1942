//! arec eval - Score recommendations against a labeled query set

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{emit_human, emit_robot, HumanLayout};
use crate::error::Result;
use crate::eval::{evaluate, load_labels, write_predictions, DEFAULT_K};

#[derive(Args, Debug)]
pub struct EvalArgs {
    /// Labeled queries (.csv with query/assessment_url columns, or .jsonl)
    pub labels: PathBuf,

    /// Cutoff for Recall@K
    #[arg(long, short, default_value_t = DEFAULT_K)]
    pub k: usize,

    /// Also write a query,assessment_url predictions CSV here
    #[arg(long)]
    pub predictions: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &EvalArgs) -> Result<()> {
    let labels = load_labels(&args.labels)?;
    let recommender = ctx.load_recommender()?;
    let report = evaluate(&labels, args.k, |query| recommender.recommend(query));

    if let Some(path) = &args.predictions {
        write_predictions(path, &report)?;
    }

    if ctx.robot_mode {
        return emit_robot(ctx.output_format, &report);
    }

    let colors = ctx.output_format.use_colors();
    let mut layout = HumanLayout::for_format(ctx.output_format);
    layout.title(&format!("Recall@{} over {} queries", report.k, report.queries.len()));
    for score in &report.queries {
        let recall = format!("{:.2}", score.recall);
        let recall = if !colors {
            recall
        } else if score.error.is_some() {
            recall.red().to_string()
        } else if score.recall >= 0.5 {
            recall.green().to_string()
        } else {
            recall.yellow().to_string()
        };
        layout.bullet(&format!(
            "{recall}  {}/{}  {}",
            score.found,
            score.relevant,
            clip(&score.query, 70)
        ));
        if let Some(error) = &score.error {
            layout.push_line(format!("    {error}"));
        }
    }
    layout
        .blank()
        .kv("Mean recall", &format!("{:.4}", report.mean_recall))
        .kv("Failures", &report.failures.to_string());
    if let Some(path) = &args.predictions {
        layout.kv("Predictions", &path.display().to_string());
    }
    emit_human(layout);
    Ok(())
}

fn clip(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let clipped: String = single_line.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{clipped}...")
}
