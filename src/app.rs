//! Per-invocation application context shared by CLI commands.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    /// Explicit `--config` path, if any.
    pub config_path: Option<PathBuf>,
    pub project_root: PathBuf,
    pub json: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let project_root = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &project_root)?;
        Ok(Self {
            config,
            config_path: cli.config.clone(),
            project_root,
            json: cli.json,
        })
    }
}
