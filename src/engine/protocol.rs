//! Messages exchanged between the coordinator side and the local engine.
//!
//! Both directions are closed tagged enums. Search traffic carries the
//! coordinator's generation so a reply can be matched to the query that
//! asked for it. The only untyped payload is the JSON-encoded `matches`
//! string, which [`parse_matches`] checks at the boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DocsError, Result};

/// Coordinator to engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MainMessage {
    #[serde(rename_all = "camelCase")]
    Init {
        supabase_url: String,
        supabase_anon_key: String,
    },
    Search {
        query: String,
        generation: u64,
    },
    AbortSearch,
}

/// Engine lifecycle milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointStatus {
    Connected,
    DatabaseOpened,
    Ready,
}

/// Engine to coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineMessage {
    Checkpoint { status: CheckpointStatus },
    /// Non-fatal engine problem; logged by the host side.
    Error { message: String },
    /// `matches` is a JSON-encoded array of raw result rows.
    SearchResults { matches: String, generation: u64 },
    SearchError { message: String, generation: u64 },
}

impl MainMessage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "INIT",
            Self::Search { .. } => "SEARCH",
            Self::AbortSearch => "ABORT_SEARCH",
        }
    }
}

impl EngineMessage {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Checkpoint { .. } => "CHECKPOINT",
            Self::Error { .. } => "ERROR",
            Self::SearchResults { .. } => "SEARCH_RESULTS",
            Self::SearchError { .. } => "SEARCH_ERROR",
        }
    }

    /// Generation of the `SEARCH` this message answers, if it is a reply.
    #[must_use]
    pub const fn reply_generation(&self) -> Option<u64> {
        match self {
            Self::SearchResults { generation, .. } | Self::SearchError { generation, .. } => {
                Some(*generation)
            }
            Self::Checkpoint { .. } | Self::Error { .. } => None,
        }
    }
}

/// Decode the `matches` payload of `SEARCH_RESULTS`. Must be a JSON array.
pub fn parse_matches(matches: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(matches)
        .map_err(|err| DocsError::Protocol(format!("bad matches payload: {err}")))?;
    if !value.is_array() {
        return Err(DocsError::Protocol("matches payload is not an array".to_string()));
    }
    Ok(value)
}
