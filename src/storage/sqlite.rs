//! SQLite database layer for the local engine.
//!
//! Owned by the engine thread; nothing outside the engine holds a
//! [`Database`].

use std::path::Path;

use half::f16;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::error::{DocsError, Result};
use crate::search::embeddings::cosine_similarity;
use crate::storage::migrations;

/// SQL name of the section/query similarity function.
pub const COSINE_SIM_FN: &str = "cosine_sim";

/// SQLite database wrapper for the documentation index
pub struct Database {
    conn: Connection,
    schema_version: u32,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

/// Display metadata stored in `page.meta`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPage {
    pub path: String,
    #[serde(rename = "type")]
    pub page_type: String,
    #[serde(default)]
    pub source: Option<String>,
    pub meta: PageMeta,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSection {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub rag_ignore: bool,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl Database {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        Self::configure_pragmas(&conn)?;
        register_functions(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            schema_version,
        })
    }

    /// Get a reference to the connection
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Current schema version after migrations.
    #[must_use]
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Insert or update a page by path, returning its id.
    pub fn upsert_page(&self, page: &NewPage) -> Result<i64> {
        let meta = serde_json::to_string(&page.meta)?;
        let id = self.conn.query_row(
            "INSERT INTO page (path, type, source, meta, content)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                type = excluded.type,
                source = excluded.source,
                meta = excluded.meta,
                content = excluded.content,
                last_refresh = datetime('now')
             RETURNING id",
            params![page.path, page.page_type, page.source, meta, page.content],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Replace all sections of a page.
    pub fn replace_sections(&mut self, page_id: i64, sections: &[NewSection]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM page_section WHERE page_id = ?", [page_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO page_section (page_id, slug, heading, content, rag_ignore, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for section in sections {
                let embedding = section.embedding.as_deref().map(encode_embedding_f16);
                stmt.execute(params![
                    page_id,
                    section.slug,
                    section.heading,
                    section.content,
                    section.rag_ignore,
                    embedding,
                ])?;
            }
        }
        tx.commit()?;
        Ok(sections.len())
    }

    pub fn page_id(&self, path: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row("SELECT id FROM page WHERE path = ?", [path], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Delete a page; its sections cascade.
    pub fn delete_page(&self, path: &str) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM page WHERE path = ?", [path])?;
        Ok(removed > 0)
    }

    pub fn page_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM page", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn section_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM page_section", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }
}

fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        COSINE_SIM_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let section: Option<Vec<u8>> = ctx.get(0)?;
            let query: Option<Vec<u8>> = ctx.get(1)?;
            let (Some(section), Some(query)) = (section, query) else {
                return Ok(None);
            };
            let section = decode_embedding_f16(&section, section.len() / 2)
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            let query = decode_embedding_f16(&query, query.len() / 2)
                .map_err(|err| rusqlite::Error::UserFunctionError(Box::new(err)))?;
            Ok(Some(f64::from(cosine_similarity(&section, &query))))
        },
    )?;
    Ok(())
}

pub fn encode_embedding_f16(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for value in values {
        let bits = f16::from_f32(*value).to_bits();
        out.extend_from_slice(&bits.to_le_bytes());
    }
    out
}

pub fn decode_embedding_f16(bytes: &[u8], dims: usize) -> Result<Vec<f32>> {
    let expected = dims.saturating_mul(2);
    if bytes.len() != expected {
        return Err(DocsError::Serialization(format!(
            "embedding blob length mismatch: expected {}, got {}",
            expected,
            bytes.len()
        )));
    }

    let mut out = Vec::with_capacity(dims);
    for chunk in bytes.chunks_exact(2) {
        let bits = u16::from_le_bytes([chunk[0], chunk[1]]);
        out.push(f16::from_bits(bits).to_f32());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::embeddings::HashEmbedder;

    fn page(path: &str, title: &str) -> NewPage {
        NewPage {
            path: path.to_string(),
            page_type: "markdown".to_string(),
            source: Some("guide".to_string()),
            meta: PageMeta {
                title: title.to_string(),
                subtitle: None,
                description: Some(format!("About {title}")),
            },
            content: format!("{title} body"),
        }
    }

    #[test]
    fn test_upsert_page_is_keyed_by_path() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_page(&page("/guides/auth", "Auth")).unwrap();
        let second = db.upsert_page(&page("/guides/auth", "Auth v2")).unwrap();

        assert_eq!(first, second);
        assert_eq!(db.page_count().unwrap(), 1);

        let meta: String = db
            .conn()
            .query_row("SELECT meta FROM page WHERE id = ?", [first], |row| row.get(0))
            .unwrap();
        assert!(meta.contains("Auth v2"));
    }

    #[test]
    fn test_sections_cascade_on_page_delete() {
        let mut db = Database::open_in_memory().unwrap();
        let id = db.upsert_page(&page("/guides/storage", "Storage")).unwrap();
        let embedder = HashEmbedder::new(16);
        let sections = vec![
            NewSection {
                slug: Some("upload".into()),
                heading: Some("Upload".into()),
                content: "upload files".into(),
                rag_ignore: false,
                embedding: Some(embedder.embed("upload files")),
            },
            NewSection {
                slug: Some("download".into()),
                heading: Some("Download".into()),
                content: "download files".into(),
                rag_ignore: false,
                embedding: None,
            },
        ];
        assert_eq!(db.replace_sections(id, &sections).unwrap(), 2);
        assert_eq!(db.section_count().unwrap(), 2);

        assert!(db.delete_page("/guides/storage").unwrap());
        assert_eq!(db.section_count().unwrap(), 0);
        assert_eq!(db.page_id("/guides/storage").unwrap(), None);
    }

    #[test]
    fn test_cosine_sim_sql_function() {
        let db = Database::open_in_memory().unwrap();
        let embedder = HashEmbedder::new(32);
        let blob = encode_embedding_f16(&embedder.embed("row level security"));

        let similarity: f64 = db
            .conn()
            .query_row("SELECT cosine_sim(?1, ?1)", [&blob], |row| row.get(0))
            .unwrap();
        assert!((similarity - 1.0).abs() < 1e-2);

        let missing: Option<f64> = db
            .conn()
            .query_row("SELECT cosine_sim(NULL, ?1)", [&blob], |row| row.get(0))
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_embedding_f16_roundtrip_precision() {
        let values = vec![0.5_f32, -0.25, 0.125, 0.0];
        let decoded = decode_embedding_f16(&encode_embedding_f16(&values), 4).unwrap();
        assert_eq!(decoded, values);
        assert!(decode_embedding_f16(&[0u8; 3], 2).is_err());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/docs.db");
        let db = Database::open(&path).unwrap();
        assert_eq!(db.schema_version(), migrations::SCHEMA_VERSION);
        assert!(path.exists());
    }
}
