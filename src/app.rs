//! Per-invocation application context.

use std::path::PathBuf;

use tracing::debug;

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::error::Result;
use crate::recommend::Recommender;
use crate::storage::Database;

/// Everything a command needs that is derived from flags, environment and
/// config files.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    /// Project state directory (`AREC_ROOT`, else `./.arec`).
    pub root: PathBuf,
    pub index_path: PathBuf,
    pub output_format: OutputFormat,
    pub robot_mode: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = std::env::var_os("AREC_ROOT")
            .map_or_else(|| PathBuf::from(".arec"), PathBuf::from);
        let config = Config::load(cli.config.as_deref(), &root)?;

        let index_path = cli
            .index
            .clone()
            .or_else(|| config.catalog.index_path.clone())
            .unwrap_or_else(|| root.join("index.db"));

        let output_format = cli.output_format();
        debug!(root = %root.display(), index = %index_path.display(), "app context ready");

        Ok(Self {
            config,
            config_path: cli.config.clone(),
            root,
            index_path,
            output_format,
            robot_mode: output_format.is_machine_readable(),
        })
    }

    /// Build a recommender from config and install the stored index.
    pub fn load_recommender(&self) -> Result<Recommender> {
        let recommender = Recommender::from_config(&self.config)?;
        let db = Database::open_existing(&self.index_path)?;
        recommender.install(db.load_index()?)?;
        Ok(recommender)
    }
}
