//! arec config - Show the effective configuration

use clap::Args;

use crate::app::AppContext;
use crate::cli::output;
use crate::config::Config;
use crate::error::{ArError, Result};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Dotted key to show (e.g. generation.model); omit for everything
    pub key: Option<String>,
}

pub fn run(ctx: &AppContext, args: &ConfigArgs) -> Result<()> {
    match &args.key {
        Some(key) => get_key(ctx, key),
        None => emit_config(ctx),
    }
}

fn emit_config(ctx: &AppContext) -> Result<()> {
    if ctx.robot_mode {
        return output::emit_robot(ctx.output_format, &ctx.config);
    }

    let rendered = toml::to_string_pretty(&ctx.config)
        .map_err(|err| ArError::Config(format!("render config: {err}")))?;
    if let Some(path) = &ctx.config_path {
        println!("# from {}", path.display());
    }
    println!("{rendered}");
    Ok(())
}

fn get_key(ctx: &AppContext, key: &str) -> Result<()> {
    let value = config_value_at(&ctx.config, key)?;
    if ctx.robot_mode {
        return output::emit_robot(ctx.output_format, &value);
    }
    println!("{}", format_value(&value));
    Ok(())
}

fn config_value_at(config: &Config, key: &str) -> Result<serde_json::Value> {
    let mut current = serde_json::to_value(config)?;
    for part in key.split('.') {
        current = match current {
            serde_json::Value::Object(mut map) => map
                .remove(part)
                .ok_or_else(|| ArError::NotFound(format!("config key '{key}'")))?,
            _ => return Err(ArError::NotFound(format!("config key '{key}'"))),
        };
    }
    Ok(current)
}

fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
