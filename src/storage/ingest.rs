//! Load pre-chunked documentation into the engine database.
//!
//! Input is a JSON document of pages, each carrying its own sections.
//! Section embeddings are computed here with the same [`Embedder`] the
//! engine uses for queries, so both sides share one vector space.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DocsError, Result};
use crate::search::embeddings::Embedder;
use crate::search::result::PageType;
use crate::storage::sqlite::{Database, NewPage, NewSection};

#[derive(Debug, Clone, Deserialize)]
pub struct IngestDocument {
    pub pages: Vec<IngestPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestPage {
    #[serde(flatten)]
    pub page: NewPage,
    #[serde(default)]
    pub sections: Vec<NewSection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub pages: usize,
    pub sections: usize,
    pub embedded: usize,
}

/// Write every page of `doc`, replacing the sections of pages that already
/// exist. Pages are validated up front; nothing is written if any is bad.
pub fn ingest(db: &mut Database, embedder: &dyn Embedder, doc: IngestDocument) -> Result<IngestStats> {
    for entry in &doc.pages {
        validate_page(&entry.page)?;
    }

    let mut stats = IngestStats::default();
    for entry in doc.pages {
        let IngestPage { page, mut sections } = entry;
        for section in &mut sections {
            if section.rag_ignore {
                section.embedding = None;
                continue;
            }
            section.embedding = Some(embedder.embed(&section_text(section)));
            stats.embedded += 1;
        }

        let page_id = db.upsert_page(&page)?;
        stats.sections += db.replace_sections(page_id, &sections)?;
        stats.pages += 1;
        debug!(path = %page.path, page_id, sections = sections.len(), "page ingested");
    }

    info!(
        pages = stats.pages,
        sections = stats.sections,
        embedded = stats.embedded,
        "ingest complete"
    );
    Ok(stats)
}

fn validate_page(page: &NewPage) -> Result<()> {
    if page.path.trim().is_empty() {
        return Err(DocsError::Serialization("page path must not be empty".to_string()));
    }
    if PageType::parse(&page.page_type).is_none() {
        return Err(DocsError::Serialization(format!(
            "page {}: unknown type '{}'",
            page.path, page.page_type
        )));
    }
    if page.meta.title.trim().is_empty() {
        return Err(DocsError::Serialization(format!("page {}: missing title", page.path)));
    }
    Ok(())
}

fn section_text(section: &NewSection) -> String {
    match &section.heading {
        Some(heading) => format!("{heading}\n{}", section.content),
        None => section.content.clone(),
    }
}
