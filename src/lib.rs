pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod remote;
pub mod search;
pub mod storage;

pub use error::{DocsError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
