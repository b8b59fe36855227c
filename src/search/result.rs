//! Canonical search result shape and the normalizer that produces it.
//!
//! Rows arrive from three places (the local engine, the lexical RPC and the
//! remote embedding endpoint) as untyped JSON. [`normalize`] validates each
//! row independently: a bad row is dropped, its siblings survive.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Kind of documentation page a result points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageType {
    Markdown,
    Discussion,
    PartnerIntegration,
    Reference,
}

impl PageType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Discussion => "discussion",
            Self::PartnerIntegration => "partner-integration",
            Self::Reference => "reference",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "markdown" => Some(Self::Markdown),
            "discussion" => Some(Self::Discussion),
            "partner-integration" => Some(Self::PartnerIntegration),
            "reference" => Some(Self::Reference),
            _ => None,
        }
    }
}

/// A matching subsection of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub title: String,
    pub slug: String,
}

/// A validated search hit.
///
/// `headings` is `Some` only when the source supplied heading and slug
/// arrays of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub path: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headings: Option<Vec<Heading>>,
}

/// Wire shape of a row before validation.
#[derive(Debug, Deserialize)]
struct RawRow {
    id: i64,
    path: String,
    #[serde(rename = "type")]
    page_type: PageType,
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    headings: Option<Vec<String>>,
    #[serde(default)]
    slugs: Option<Vec<String>>,
}

impl From<RawRow> for SearchResult {
    fn from(row: RawRow) -> Self {
        let headings = match (row.headings, row.slugs) {
            (Some(titles), Some(slugs)) if titles.len() == slugs.len() => Some(
                titles
                    .into_iter()
                    .zip(slugs)
                    .map(|(title, slug)| Heading { title, slug })
                    .collect(),
            ),
            _ => None,
        };

        Self {
            id: row.id,
            path: row.path,
            page_type: row.page_type,
            title: row.title,
            subtitle: row.subtitle,
            description: row.description,
            headings,
        }
    }
}

/// Validate and reshape a raw payload into search results.
///
/// Anything other than a JSON array yields no results. Never fails.
#[must_use]
pub fn normalize(raw: &Value) -> Vec<SearchResult> {
    let Some(rows) = raw.as_array() else {
        debug!(kind = json_kind(raw), "search payload is not an array; ignoring");
        return Vec::new();
    };

    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match RawRow::deserialize(row) {
            Ok(row) => Some(SearchResult::from(row)),
            Err(err) => {
                debug!(index, error = %err, "dropping malformed search row");
                None
            }
        })
        .collect()
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
