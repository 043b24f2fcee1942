//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod build;
pub mod config;
pub mod embed;
pub mod eval;
pub mod health;
pub mod recommend;
pub mod serve;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Build(args) => build::run(ctx, args),
        Commands::Recommend(args) => recommend::run(ctx, args),
        Commands::Serve(args) => serve::run(ctx, args),
        Commands::Health(args) => health::run(ctx, args),
        Commands::Embed(args) => embed::run(ctx, args),
        Commands::Eval(args) => eval::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
    }
}
