//! Storage layer for the local engine: SQLite schema, migrations and ingest.

pub mod ingest;
pub mod migrations;
pub mod sqlite;

pub use ingest::{IngestDocument, IngestPage, IngestStats, ingest};
pub use sqlite::{Database, NewPage, NewSection, PageMeta};
