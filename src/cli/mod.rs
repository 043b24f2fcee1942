//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

pub mod commands;
pub mod output;

/// arec - recommend assessments for a hiring query
#[derive(Parser, Debug)]
#[command(name = "arec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// JSON output for scripts (alias of --machine, kept for older callers)
    #[arg(long, global = true, hide = true)]
    pub robot: bool,

    /// Output format (human, json, jsonl, plain)
    #[arg(long, short = 'O', global = true, value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Machine-readable JSON output (shorthand for --output-format=json)
    #[arg(long, short = 'm', global = true)]
    pub machine: bool,

    /// Force plain output (no colors)
    #[arg(long, global = true)]
    pub plain: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/arec/config.toml, then .arec/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Index database path (default: .arec/index.db)
    #[arg(long, global = true)]
    pub index: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Effective output format.
    ///
    /// Priority: `--plain`, then `--output-format`, then `--machine`, then
    /// `--robot`, then human.
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        if self.plain {
            return OutputFormat::Plain;
        }
        if let Some(fmt) = self.output_format {
            return fmt;
        }
        if self.machine || self.robot {
            return OutputFormat::Json;
        }
        OutputFormat::Human
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed a catalog file and store the index
    Build(commands::build::BuildArgs),

    /// Recommend assessments for a query or job-description URL
    Recommend(commands::recommend::RecommendArgs),

    /// Serve the HTTP API
    Serve(commands::serve::ServeArgs),

    /// Report whether a usable index is present
    Health(commands::health::HealthArgs),

    /// Inspect the embedding backend
    Embed(commands::embed::EmbedArgs),

    /// Score recommendations against a labeled query set
    Eval(commands::eval::EvalArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}
