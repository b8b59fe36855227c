//! Search coordinator
//!
//! Routes each query to the local engine when its link is ready, otherwise
//! races the two remote legs. Every outcome ends up as an action on the
//! [`SearchStore`]; nothing is returned to the caller.
//!
//! Each query opens a new generation with its own cancellation token. The
//! generation travels with the local `SEARCH` and comes back on the reply;
//! remote legs capture it. A response is committed only if its generation is
//! still current. The check and the dispatch happen under one lock, so a
//! superseded response can never land after a newer `TRIGGERED`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::state::SearchAction;
use super::store::SearchStore;
use crate::engine::protocol::parse_matches;
use crate::engine::{EngineLink, EngineMessage, MainMessage};
use crate::error::{DocsError, Result};
use crate::remote::RemoteSearch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Leg {
    Lexical,
    Semantic,
}

impl Leg {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        }
    }
}

/// Bookkeeping for the current generation.
#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    generation: u64,
    /// Remote legs of this generation that have not resolved.
    outstanding: usize,
    /// A local `SEARCH` was posted and has not been answered.
    local_pending: bool,
}

impl Progress {
    const fn is_idle(&self) -> bool {
        self.outstanding == 0 && !self.local_pending
    }
}

struct Shared {
    store: Arc<SearchStore>,
    progress: watch::Sender<Progress>,
}

impl Shared {
    fn commit_remote(
        &self,
        leg: Leg,
        generation: u64,
        token: &CancellationToken,
        outcome: Result<Value>,
    ) {
        if matches!(&outcome, Err(err) if err.is_aborted()) {
            debug!(leg = leg.as_str(), generation, "remote request aborted");
            return;
        }

        self.progress.send_if_modified(|progress| {
            if token.is_cancelled() || progress.generation != generation {
                debug!(
                    leg = leg.as_str(),
                    generation,
                    current = progress.generation,
                    "discarding superseded remote response"
                );
                return false;
            }

            let outstanding = progress.outstanding;
            progress.outstanding = outstanding.saturating_sub(1);

            match outcome {
                Ok(rows) => self.store.dispatch(SearchAction::Completed {
                    results: rows,
                    still_outstanding: outstanding > 1,
                }),
                Err(err) => {
                    warn!(leg = leg.as_str(), generation, error = %err, "remote search failed");
                    if outstanding == 1 {
                        self.store.dispatch(SearchAction::Errored);
                    }
                }
            }
            true
        });
    }

    fn commit_local(&self, message: EngineMessage) {
        let Some(generation) = message.reply_generation() else {
            trace!(message = message.name(), "ignoring non-search engine event");
            return;
        };

        self.progress.send_if_modified(|progress| {
            if progress.generation != generation {
                debug!(
                    generation,
                    current = progress.generation,
                    "discarding superseded engine reply"
                );
                return false;
            }

            progress.local_pending = false;
            match message {
                EngineMessage::SearchResults { matches, .. } => match parse_matches(&matches) {
                    Ok(rows) => self.store.dispatch(SearchAction::completed(rows)),
                    Err(err) => {
                        warn!(generation, error = %err, "engine returned unusable matches");
                        self.store.dispatch(SearchAction::Errored);
                    }
                },
                EngineMessage::SearchError { message, .. } => {
                    warn!(generation, message = %message, "local search failed");
                    self.store.dispatch(SearchAction::Errored);
                }
                EngineMessage::Checkpoint { .. } | EngineMessage::Error { .. } => {}
            }
            true
        });
    }

    /// Settle `generation` as failed if it is still current.
    fn fail(&self, generation: u64) {
        self.progress.send_if_modified(|progress| {
            if progress.generation != generation {
                return false;
            }
            progress.outstanding = 0;
            progress.local_pending = false;
            self.store.dispatch(SearchAction::Errored);
            true
        });
    }
}

/// Dual-path search coordinator.
pub struct SearchCoordinator<R: RemoteSearch> {
    shared: Arc<Shared>,
    remote: Option<Arc<R>>,
    engine: Option<EngineLink>,
    cancel: Mutex<CancellationToken>,
    listener: Option<JoinHandle<()>>,
}

impl<R: RemoteSearch> std::fmt::Debug for SearchCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCoordinator")
            .field("engine", &self.engine)
            .field("remote", &self.remote.is_some())
            .field("progress", &*self.shared.progress.borrow())
            .finish_non_exhaustive()
    }
}

impl<R: RemoteSearch> SearchCoordinator<R> {
    /// Coordinator without a local engine.
    #[must_use]
    pub fn new(store: Arc<SearchStore>, remote: Option<R>) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            shared: Arc::new(Shared { store, progress }),
            remote: remote.map(Arc::new),
            engine: None,
            cancel: Mutex::new(CancellationToken::new()),
            listener: None,
        }
    }

    /// Coordinator with a local engine. `connect` receives the sender for
    /// search replies and returns the started link. Must be called inside a
    /// tokio runtime.
    pub fn with_engine<F>(store: Arc<SearchStore>, remote: Option<R>, connect: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<EngineMessage>) -> EngineLink,
    {
        let mut coordinator = Self::new(store, remote);
        let (tx, mut rx) = mpsc::unbounded_channel();
        coordinator.engine = Some(connect(tx));

        let shared = Arc::clone(&coordinator.shared);
        coordinator.listener = Some(tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                shared.commit_local(message);
            }
        }));
        coordinator
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SearchStore> {
        &self.shared.store
    }

    #[must_use]
    pub const fn engine(&self) -> Option<&EngineLink> {
        self.engine.as_ref()
    }

    /// Current generation number; bumps on every `search` and `reset`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.progress.borrow().generation
    }

    /// Start a query. Results surface through the store.
    pub fn search(&self, query: &str) {
        let engine = self.engine.as_ref().filter(|engine| engine.is_ready());
        // In-flight bookkeeping is in place before TRIGGERED so `settled`
        // never mistakes the previous state for this query's answer.
        let (generation, token) = match (engine, &self.remote) {
            (Some(_), _) => self.supersede(0, true),
            (None, Some(_)) => self.supersede(2, false),
            // The only answer coming is the failure below.
            (None, None) => self.supersede(1, false),
        };
        self.shared.store.dispatch(SearchAction::Triggered);

        if let Some(engine) = engine {
            match engine.post(MainMessage::Search {
                query: query.to_string(),
                generation,
            }) {
                Ok(()) => {
                    debug!(query = %query, generation, "search routed to local engine");
                    return;
                }
                Err(err) if self.remote.is_some() => {
                    warn!(error = %err, "local engine rejected search; falling back to remote");
                    self.shared.progress.send_modify(|progress| {
                        if progress.generation == generation {
                            progress.outstanding = 2;
                            progress.local_pending = false;
                        }
                    });
                }
                Err(err) => {
                    warn!(error = %err, query = %query, "local engine rejected search");
                    self.shared.fail(generation);
                    return;
                }
            }
        }

        let Some(remote) = self.remote.clone() else {
            warn!(query = %query, "no search backend available");
            self.shared.fail(generation);
            return;
        };
        debug!(query = %query, generation, "search routed to remote legs");

        for leg in [Leg::Lexical, Leg::Semantic] {
            let shared = Arc::clone(&self.shared);
            let remote = Arc::clone(&remote);
            let token = token.clone();
            let query = query.to_string();
            tokio::spawn(async move {
                let request = async {
                    match leg {
                        Leg::Lexical => remote.lexical(&query).await,
                        Leg::Semantic => remote.semantic(&query).await,
                    }
                };
                let outcome = tokio::select! {
                    biased;
                    () = token.cancelled() => Err(DocsError::Aborted),
                    outcome = request => outcome,
                };
                shared.commit_remote(leg, generation, &token, outcome);
            });
        }
    }

    /// Abort whatever is in flight and return to `initial`.
    pub fn reset(&self) {
        if let Some(engine) = &self.engine {
            if let Err(err) = engine.post(MainMessage::AbortSearch) {
                trace!(error = %err, "no engine channel to abort");
            }
        }

        let token = std::mem::replace(&mut *self.cancel.lock(), CancellationToken::new());
        token.cancel();
        self.shared.progress.send_modify(|progress| {
            progress.generation += 1;
            progress.outstanding = 0;
            progress.local_pending = false;
            self.shared.store.dispatch(SearchAction::Reset);
        });
    }

    /// Resolve once nothing of the current generation is in flight and the
    /// state is terminal.
    pub async fn settled(&self) {
        let mut progress = self.shared.progress.subscribe();
        let mut states = self.shared.store.subscribe();
        loop {
            let idle = progress.borrow_and_update().is_idle();
            let terminal = !states.borrow_and_update().is_pending();
            if idle && terminal {
                return;
            }
            tokio::select! {
                changed = progress.changed() => if changed.is_err() { return },
                changed = states.changed() => if changed.is_err() { return },
            }
        }
    }

    /// Cancel the previous generation and open a new one with the given
    /// in-flight bookkeeping.
    fn supersede(&self, outstanding: usize, local_pending: bool) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.cancel.lock(), token.clone());
        previous.cancel();

        let mut generation = 0;
        self.shared.progress.send_modify(|progress| {
            progress.generation += 1;
            progress.outstanding = outstanding;
            progress.local_pending = local_pending;
            generation = progress.generation;
        });
        (generation, token)
    }
}

impl<R: RemoteSearch> Drop for SearchCoordinator<R> {
    fn drop(&mut self) {
        self.cancel.lock().cancel();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
