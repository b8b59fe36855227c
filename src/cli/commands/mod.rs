//! CLI command implementations
//!
//! Each subcommand has its own module with an Args struct and a `run()`
//! function.

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod config;
pub mod ingest;
pub mod search;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Search(args) => search::run(ctx, args),
        Commands::Ingest(args) => ingest::run(ctx, args),
        Commands::Config(args) => config::run(ctx, args),
    }
}
