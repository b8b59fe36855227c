//! docsearch ingest - Load pages and sections into the engine database

use std::path::PathBuf;

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output;
use crate::error::{DocsError, Result};
use crate::search::build_embedder;
use crate::storage::{Database, IngestDocument, ingest};

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON document with a `pages` array
    pub file: PathBuf,

    /// Database to write (defaults to engine.database_path)
    #[arg(long)]
    pub database: Option<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &IngestArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file).map_err(|err| {
        DocsError::NotFound(format!("ingest file {}: {err}", args.file.display()))
    })?;
    let doc: IngestDocument = serde_json::from_str(&raw)?;

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| ctx.config.engine.database_path.clone());
    let mut db = Database::open(&db_path)?;
    let embedder = build_embedder(&ctx.config.engine)?;

    let stats = ingest(&mut db, embedder.as_ref(), doc)?;
    let total_pages = db.page_count()?;

    if ctx.json {
        return output::emit_json(&serde_json::json!({
            "database": db_path,
            "stats": stats,
            "total_pages": total_pages,
        }));
    }

    println!(
        "{} Ingested {} pages ({} sections, {} embedded) into {}",
        "✓".green(),
        stats.pages.to_string().bold(),
        stats.sections,
        stats.embedded,
        db_path.display().to_string().cyan()
    );
    println!("  {total_pages} pages in database");
    Ok(())
}
