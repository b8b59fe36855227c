//! Search display state machine.
//!
//! [`reduce`] is total over every (state, action) pair. Transitions that a
//! correct coordinator never produces are logged and leave the state as is.
//!
//! ```text
//!            TRIGGERED              COMPLETED (n > 0)
//!  initial ───────────▶ loading ─────────────────────▶ results
//!     ▲                    │  COMPLETED (n = 0)          │ TRIGGERED
//!     │ RESET (any)        └───────────────▶ empty       ▼ (remote fallback)
//!     │                                               stale
//!     └──────────── ERRORED (any) ─▶ error ─TRIGGERED─▶ loading
//! ```

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::result::{SearchResult, normalize};

/// What the user currently sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchState {
    Initial,
    Loading,
    /// Previous results stay visible while a newer query is in flight.
    Stale { results: Vec<SearchResult> },
    Results { results: Vec<SearchResult> },
    Empty,
    Error,
}

impl SearchState {
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::Initial => StateKind::Initial,
            Self::Loading => StateKind::Loading,
            Self::Stale { .. } => StateKind::Stale,
            Self::Results { .. } => StateKind::Results,
            Self::Empty => StateKind::Empty,
            Self::Error => StateKind::Error,
        }
    }

    /// Results currently on screen, if any.
    #[must_use]
    pub fn results(&self) -> &[SearchResult] {
        match self {
            Self::Stale { results } | Self::Results { results } => results,
            _ => &[],
        }
    }

    /// Whether a query is still expected to change this state.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Loading | Self::Stale { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Initial,
    Loading,
    Stale,
    Results,
    Empty,
    Error,
}

/// Events fed to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchAction {
    Triggered,
    Errored,
    Completed {
        /// Unvalidated payload; normalized inside the reducer.
        results: Value,
        /// A sibling request for the same query has not resolved yet.
        still_outstanding: bool,
    },
    Reset,
}

impl SearchAction {
    #[must_use]
    pub const fn completed(results: Value) -> Self {
        Self::Completed {
            results,
            still_outstanding: false,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Triggered => ActionKind::Triggered,
            Self::Errored => ActionKind::Errored,
            Self::Completed { .. } => ActionKind::Completed,
            Self::Reset => ActionKind::Reset,
        }
    }
}

/// Payload-free action tag, used for observing dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Triggered,
    Errored,
    Completed,
    Reset,
}

/// Which search surface the machine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReducerVariant {
    /// Local engine only: a new query leaves results untouched and the
    /// next completion replaces them.
    LocalOnly,
    /// Local engine with remote dual-source fallback: a new query turns
    /// results stale, and completions in `results` merge sibling answers.
    #[default]
    RemoteFallback,
}

/// Apply one action to a state.
#[must_use]
pub fn reduce(state: SearchState, action: &SearchAction, variant: ReducerVariant) -> SearchState {
    use SearchState as S;

    match (state, action) {
        (_, SearchAction::Reset) => S::Initial,
        (_, SearchAction::Errored) => S::Error,

        (S::Initial | S::Error, SearchAction::Triggered) => S::Loading,
        (S::Results { results }, SearchAction::Triggered) => match variant {
            ReducerVariant::LocalOnly => S::Results { results },
            ReducerVariant::RemoteFallback => S::Stale { results },
        },
        (state @ (S::Loading | S::Empty | S::Stale { .. }), SearchAction::Triggered) => state,

        (
            state @ (S::Initial | S::Error),
            SearchAction::Completed { .. },
        ) => {
            warn!(state = ?state.kind(), "invalid transition: COMPLETED before TRIGGERED");
            state
        }
        (
            S::Results { results },
            SearchAction::Completed {
                results: raw,
                still_outstanding,
            },
        ) if variant == ReducerVariant::RemoteFallback => merge(results, raw, *still_outstanding),
        (
            state,
            SearchAction::Completed {
                results: raw,
                still_outstanding,
            },
        ) => replace(state, raw, *still_outstanding),
    }
}

/// Replace the visible set with a fresh answer.
fn replace(state: SearchState, raw: &Value, still_outstanding: bool) -> SearchState {
    let fresh = dedup_by_path(normalize(raw));
    if fresh.is_empty() {
        if still_outstanding {
            return state;
        }
        return SearchState::Empty;
    }
    SearchState::Results { results: fresh }
}

/// Append unseen paths after the results already on screen.
fn merge(existing: Vec<SearchResult>, raw: &Value, still_outstanding: bool) -> SearchState {
    let mut seen: HashSet<String> = existing.iter().map(|r| r.path.clone()).collect();
    let additions: Vec<SearchResult> = normalize(raw)
        .into_iter()
        .filter(|r| seen.insert(r.path.clone()))
        .collect();

    if existing.is_empty() && additions.is_empty() && !still_outstanding {
        return SearchState::Empty;
    }

    let mut results = existing;
    results.extend(additions);
    SearchState::Results { results }
}

fn dedup_by_path(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.path.clone()))
        .collect()
}
