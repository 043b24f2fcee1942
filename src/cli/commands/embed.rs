//! arec embed - Inspect the embedding backend
//!
//! Utility command for checking what the configured embedder produces for
//! a piece of text, and how close two texts land.

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{emit_human, emit_robot, HumanLayout};
use crate::error::Result;
use crate::search::{build_embedder, cosine_similarity, l2_distance};

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Text to embed
    pub text: String,

    /// Compare with another text (cosine similarity and L2 distance)
    #[arg(long, short)]
    pub compare: Option<String>,

    /// Include the full vector in the output
    #[arg(long)]
    pub full: bool,
}

#[derive(Debug, Serialize)]
struct EmbedReport {
    backend: String,
    dims: usize,
    tokens: usize,
    max_tokens: usize,
    truncated: bool,
    l2_norm: f32,
    non_zero: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    comparison: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct Comparison {
    text: String,
    cosine: f32,
    l2: f32,
}

pub fn run(ctx: &AppContext, args: &EmbedArgs) -> Result<()> {
    let embedder = build_embedder(&ctx.config.embedding)?;
    let text = embedder.truncate(&args.text);
    let vector = embedder.embed(&text)?;

    let comparison = match &args.compare {
        Some(other) => {
            let other_vector = embedder.embed(&embedder.truncate(other))?;
            Some(Comparison {
                text: other.clone(),
                cosine: cosine_similarity(&vector, &other_vector),
                l2: l2_distance(&vector, &other_vector),
            })
        }
        None => None,
    };

    let tokens = embedder.count_tokens(&args.text);
    let report = EmbedReport {
        backend: embedder.name().to_string(),
        dims: embedder.dims(),
        tokens,
        max_tokens: embedder.max_tokens(),
        truncated: tokens > embedder.max_tokens(),
        l2_norm: vector.iter().map(|x| x * x).sum::<f32>().sqrt(),
        non_zero: vector.iter().filter(|x| x.abs() > 1e-10).count(),
        comparison,
        vector: args.full.then_some(vector),
    };

    if ctx.robot_mode {
        return emit_robot(ctx.output_format, &report);
    }

    let mut layout = HumanLayout::for_format(ctx.output_format);
    layout
        .title("Embedding")
        .kv("Backend", &report.backend)
        .kv("Dimensions", &report.dims.to_string())
        .kv(
            "Tokens",
            &format!("{} (limit {})", report.tokens, report.max_tokens),
        )
        .kv("Truncated", if report.truncated { "yes" } else { "no" })
        .kv("L2 norm", &format!("{:.6}", report.l2_norm))
        .kv("Non-zero", &report.non_zero.to_string());

    if let Some(cmp) = &report.comparison {
        let cosine = format!("{:.4}", cmp.cosine);
        let cosine = if !ctx.output_format.use_colors() {
            cosine
        } else if cmp.cosine > 0.8 {
            cosine.green().to_string()
        } else if cmp.cosine > 0.5 {
            cosine.yellow().to_string()
        } else {
            cosine.red().to_string()
        };
        layout
            .blank()
            .section("Comparison")
            .kv("Other text", &cmp.text)
            .kv("Cosine", &cosine)
            .kv("L2 distance", &format!("{:.4}", cmp.l2));
    }

    if let Some(vector) = &report.vector {
        layout.blank().section("Vector");
        for chunk in vector.chunks(8) {
            let row: Vec<String> = chunk.iter().map(|v| format!("{v:8.5}")).collect();
            layout.push_line(row.join(" "));
        }
    }
    emit_human(layout);
    Ok(())
}
