//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// Search documentation through the local engine or the remote backend
#[derive(Parser, Debug)]
#[command(name = "docsearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Machine-readable JSON output (logs switch to JSON on stderr too)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/docsearch/config.toml)
    #[arg(long, global = true, env = "DOCSEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a search query
    Search(commands::search::SearchArgs),

    /// Load pages and sections into the local engine database
    Ingest(commands::ingest::IngestArgs),

    /// Show the effective configuration
    Config(commands::config::ConfigArgs),
}
