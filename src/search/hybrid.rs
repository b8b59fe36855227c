//! Hybrid ranking query
//!
//! One SQL statement fuses two retrieval legs over the local database:
//!
//! ```text
//! semantic  = top N sections by cosine_sim(embedding, query) > threshold,
//!             grouped per page, score = max(similarity) * semantic_scale
//! lexical   = top M pages by weighted bm25 over page_fts,
//!             score = min(1, -bm25 * lexical_scale) * 100
//! fused     = semantic UNION ALL lexical,
//!             ROW_NUMBER() OVER (PARTITION BY page_id ORDER BY score DESC) = 1,
//!             ORDER BY score DESC LIMIT K
//! ```
//!
//! Fusion is max-wins: a page found by both legs keeps only its
//! higher-scoring occurrence, so section headings survive only when the
//! semantic leg was the more confident one.

use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RankingConfig;
use crate::error::Result;
use crate::search::embeddings::Embedder;
use crate::storage::Database;
use crate::storage::sqlite::encode_embedding_f16;

/// Tunables bound into the fused query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingParams {
    pub match_threshold: f32,
    pub semantic_limit: u32,
    pub lexical_limit: u32,
    pub result_limit: u32,
    pub lexical_scale: f32,
    pub semantic_scale: f32,
    /// bm25 column weights: title, subtitle, description, body
    pub weights: [f32; 4],
}

impl Default for RankingParams {
    fn default() -> Self {
        Self::from(&RankingConfig::default())
    }
}

impl From<&RankingConfig> for RankingParams {
    fn from(config: &RankingConfig) -> Self {
        Self {
            match_threshold: config.match_threshold,
            semantic_limit: config.semantic_limit,
            lexical_limit: config.lexical_limit,
            result_limit: config.result_limit,
            lexical_scale: config.lexical_scale,
            semantic_scale: config.semantic_scale,
            weights: [
                config.title_weight,
                config.subtitle_weight,
                config.description_weight,
                config.body_weight,
            ],
        }
    }
}

/// A fused hit as the engine ships it over the channel.
///
/// The field names match the raw row shape the normalizer accepts, so the
/// serialized list can be fed straight into a `COMPLETED` action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPage {
    pub id: i64,
    pub path: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub headings: Vec<String>,
    pub slugs: Vec<String>,
    pub score: f64,
}

const SEMANTIC_CTES: &str = "
semantic_sections AS (
    SELECT
        s.page_id,
        s.heading,
        s.slug,
        cosine_sim(s.embedding, :query_embedding) AS similarity
    FROM page_section s
    WHERE s.embedding IS NOT NULL AND s.rag_ignore = 0
),
semantic_top AS (
    SELECT page_id, heading, slug, similarity
    FROM semantic_sections
    WHERE similarity > :match_threshold
    ORDER BY similarity DESC
    LIMIT :semantic_limit
),
semantic AS (
    SELECT
        page_id,
        json_group_array(coalesce(heading, '')) AS headings,
        json_group_array(coalesce(slug, '')) AS slugs,
        max(similarity) * :semantic_scale AS score
    FROM semantic_top
    GROUP BY page_id
)";

const LEXICAL_CTE: &str = "
lexical AS (
    SELECT
        rowid AS page_id,
        '[]' AS headings,
        '[]' AS slugs,
        min(1.0, -bm25(page_fts, :w_title, :w_subtitle, :w_description, :w_body) * :lexical_scale)
            * 100.0 AS score
    FROM page_fts
    WHERE page_fts MATCH :fts_query
    ORDER BY bm25(page_fts, :w_title, :w_subtitle, :w_description, :w_body)
    LIMIT :lexical_limit
)";

const FUSION_TAIL: &str = "
ranked AS (
    SELECT
        page_id,
        headings,
        slugs,
        score,
        ROW_NUMBER() OVER (PARTITION BY page_id ORDER BY score DESC) AS occurrence
    FROM candidates
)
SELECT
    p.id,
    p.path,
    p.type,
    coalesce(json_extract(p.meta, '$.title'), ''),
    json_extract(p.meta, '$.subtitle'),
    json_extract(p.meta, '$.description'),
    r.headings,
    r.slugs,
    r.score
FROM ranked r
JOIN page p ON p.id = r.page_id
WHERE r.occurrence = 1
ORDER BY r.score DESC, p.id ASC
LIMIT :result_limit";

/// Prepared shape of the fused query for one set of params.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    params: RankingParams,
}

impl HybridQuery {
    #[must_use]
    pub const fn new(params: RankingParams) -> Self {
        Self { params }
    }

    /// SQL text for the query, with or without the lexical leg.
    #[must_use]
    pub fn sql(with_lexical: bool) -> String {
        if with_lexical {
            format!(
                "WITH {SEMANTIC_CTES},{LEXICAL_CTE},
candidates AS (
    SELECT page_id, headings, slugs, score FROM semantic
    UNION ALL
    SELECT page_id, headings, slugs, score FROM lexical
),{FUSION_TAIL}"
            )
        } else {
            format!(
                "WITH {SEMANTIC_CTES},
candidates AS (
    SELECT page_id, headings, slugs, score FROM semantic
),{FUSION_TAIL}"
            )
        }
    }

    /// Run the fused query for a precomputed query embedding.
    pub fn execute(
        &self,
        db: &Database,
        query_embedding: &[f32],
        query: &str,
    ) -> Result<Vec<RankedPage>> {
        let p = &self.params;
        let embedding = encode_embedding_f16(query_embedding);
        let fts_query = fts_match_expression(query);
        let with_lexical = fts_query.is_some();
        let fts_query = fts_query.unwrap_or_default();

        let mut bindings: Vec<(&str, &dyn ToSql)> = vec![
            (":query_embedding", &embedding as &dyn ToSql),
            (":match_threshold", &p.match_threshold as &dyn ToSql),
            (":semantic_limit", &p.semantic_limit as &dyn ToSql),
            (":semantic_scale", &p.semantic_scale as &dyn ToSql),
            (":result_limit", &p.result_limit as &dyn ToSql),
        ];
        if with_lexical {
            bindings.push((":fts_query", &fts_query as &dyn ToSql));
            bindings.push((":w_title", &p.weights[0] as &dyn ToSql));
            bindings.push((":w_subtitle", &p.weights[1] as &dyn ToSql));
            bindings.push((":w_description", &p.weights[2] as &dyn ToSql));
            bindings.push((":w_body", &p.weights[3] as &dyn ToSql));
            bindings.push((":lexical_scale", &p.lexical_scale as &dyn ToSql));
            bindings.push((":lexical_limit", &p.lexical_limit as &dyn ToSql));
        }

        let sql = Self::sql(with_lexical);
        let mut stmt = db.conn().prepare_cached(&sql)?;
        let rows = stmt.query_map(bindings.as_slice(), |row| {
            let headings: String = row.get(6)?;
            let slugs: String = row.get(7)?;
            Ok(RawRanked {
                id: row.get(0)?,
                path: row.get(1)?,
                page_type: row.get(2)?,
                title: row.get(3)?,
                subtitle: row.get(4)?,
                description: row.get(5)?,
                headings,
                slugs,
                score: row.get(8)?,
            })
        })?;

        let mut pages = Vec::new();
        for row in rows {
            pages.push(row?.into_page()?);
        }

        debug!(
            query = %query,
            lexical = with_lexical,
            hits = pages.len(),
            "hybrid query complete"
        );
        Ok(pages)
    }
}

struct RawRanked {
    id: i64,
    path: String,
    page_type: String,
    title: String,
    subtitle: Option<String>,
    description: Option<String>,
    headings: String,
    slugs: String,
    score: f64,
}

impl RawRanked {
    fn into_page(self) -> Result<RankedPage> {
        Ok(RankedPage {
            id: self.id,
            path: self.path,
            page_type: self.page_type,
            title: self.title,
            subtitle: self.subtitle,
            description: self.description,
            headings: serde_json::from_str(&self.headings)?,
            slugs: serde_json::from_str(&self.slugs)?,
            score: self.score,
        })
    }
}

/// Embed the query and run the fused ranking.
pub fn hybrid_search(
    db: &Database,
    embedder: &dyn Embedder,
    query: &str,
    params: &RankingParams,
) -> Result<Vec<RankedPage>> {
    let embedding = embedder.embed(query);
    HybridQuery::new(params.clone()).execute(db, &embedding, query)
}

/// Turn free text into an FTS5 MATCH expression.
///
/// Each whitespace-separated term becomes a quoted phrase so user input
/// never reaches the FTS5 query grammar; phrases are implicitly ANDed.
/// Returns `None` when nothing searchable remains.
#[must_use]
pub fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|term| term.chars().any(char::is_alphanumeric))
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
