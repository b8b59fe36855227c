//! Local engine execution context.
//!
//! The engine runs on its own OS thread and owns the database and the
//! embedder outright. Coordinators talk to it through [`EnginePort`]s:
//! requests travel over one crossbeam channel tagged with the port id,
//! replies come back on a per-port tokio channel. Nothing mutable is shared.
//!
//! A dedicated host serves a single port and stops when that port closes.
//! A shared host serves any number of ports until [`EngineHost::shutdown`].

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::protocol::{CheckpointStatus, EngineMessage, MainMessage};
use crate::config::{ChannelKind, Config};
use crate::error::{DocsError, Result};
use crate::search::embeddings::HashEmbedder;
use crate::search::hybrid::{RankingParams, hybrid_search};
use crate::storage::Database;

pub type PortId = u64;

/// Everything the engine thread needs to build its own state.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// `None` opens a private in-memory database.
    pub database_path: Option<PathBuf>,
    pub embedding_dims: usize,
    pub ranking: RankingParams,
}

impl EngineOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            database_path: Some(config.engine.database_path.clone()),
            embedding_dims: config.engine.embedding_dims as usize,
            ranking: RankingParams::from(&config.ranking),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            database_path: None,
            embedding_dims: 384,
            ranking: RankingParams::default(),
        }
    }
}

enum Envelope {
    Connect {
        port: PortId,
        events: mpsc::UnboundedSender<EngineMessage>,
    },
    Message {
        port: PortId,
        message: MainMessage,
    },
    Disconnect {
        port: PortId,
    },
    Shutdown,
}

struct HostInner {
    tx: Sender<Envelope>,
    next_port: AtomicU64,
    thread: Mutex<Option<JoinHandle<()>>>,
    dedicated: bool,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        // Thread may already be gone.
        let _ = self.tx.send(Envelope::Shutdown);
    }
}

/// Handle to a running engine thread.
#[derive(Clone)]
pub struct EngineHost {
    inner: Arc<HostInner>,
}

impl std::fmt::Debug for EngineHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHost")
            .field("dedicated", &self.inner.dedicated)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl EngineHost {
    /// Start a host that any number of ports may attach to.
    pub fn spawn_shared(options: EngineOptions) -> Result<Self> {
        Self::spawn(options, false)
    }

    /// Start a host for exactly one port; it stops when that port closes.
    pub fn spawn_dedicated(options: EngineOptions) -> Result<Self> {
        Self::spawn(options, true)
    }

    fn spawn(options: EngineOptions, dedicated: bool) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = std::thread::Builder::new()
            .name("docsearch-engine".to_string())
            .spawn(move || Engine::new(options, rx, dedicated).run())?;

        debug!(dedicated, "engine host started");
        Ok(Self {
            inner: Arc::new(HostInner {
                tx,
                next_port: AtomicU64::new(1),
                thread: Mutex::new(Some(handle)),
                dedicated,
            }),
        })
    }

    /// Attach a new port. The engine greets it with `CHECKPOINT{CONNECTED}`.
    pub fn connect(&self) -> Result<EnginePort> {
        let port = self.inner.next_port.fetch_add(1, Ordering::Relaxed);
        if self.inner.dedicated && port > 1 {
            return Err(DocsError::EngineUnavailable(
                "dedicated engine already has a port".to_string(),
            ));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.inner
            .tx
            .send(Envelope::Connect {
                port,
                events: events_tx,
            })
            .map_err(|_| DocsError::ChannelClosed)?;

        Ok(EnginePort {
            id: port,
            host: Arc::clone(&self.inner),
            events: Some(events_rx),
            closed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .thread
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the engine thread and wait for it. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let Some(handle) = self.inner.thread.lock().take() else {
            return;
        };
        let _ = self.inner.tx.send(Envelope::Shutdown);
        if handle.join().is_err() {
            warn!("engine thread panicked");
        }
        debug!("engine host stopped");
    }
}

/// Open an engine channel of the requested kind.
///
/// A shared channel attaches to `shared`, which the caller owns; there is no
/// process-wide host.
pub fn open_channel(
    kind: ChannelKind,
    options: EngineOptions,
    shared: Option<&EngineHost>,
) -> Result<EnginePort> {
    match kind {
        ChannelKind::Dedicated => EngineHost::spawn_dedicated(options)?.connect(),
        ChannelKind::Shared => shared
            .ok_or_else(|| {
                DocsError::EngineUnavailable("shared channel requested without a host".to_string())
            })?
            .connect(),
    }
}

/// One coordinator's connection to an engine host.
pub struct EnginePort {
    id: PortId,
    host: Arc<HostInner>,
    events: Option<mpsc::UnboundedReceiver<EngineMessage>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for EnginePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnginePort")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl EnginePort {
    #[must_use]
    pub const fn id(&self) -> PortId {
        self.id
    }

    pub fn post(&self, message: MainMessage) -> Result<()> {
        if self.is_closed() {
            return Err(DocsError::ChannelClosed);
        }
        trace!(port = self.id, message = message.name(), "post to engine");
        self.host
            .tx
            .send(Envelope::Message {
                port: self.id,
                message,
            })
            .map_err(|_| DocsError::ChannelClosed)
    }

    /// Take the event stream. Only the first call gets it.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<EngineMessage>> {
        self.events.take()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Detach from the host. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.host.tx.send(Envelope::Disconnect { port: self.id });
        debug!(port = self.id, "engine port closed");
    }
}

impl Drop for EnginePort {
    fn drop(&mut self) {
        self.close();
    }
}

struct Engine {
    options: EngineOptions,
    rx: Receiver<Envelope>,
    backlog: VecDeque<Envelope>,
    ports: HashMap<PortId, mpsc::UnboundedSender<EngineMessage>>,
    db: Option<Database>,
    embedder: HashEmbedder,
    dedicated: bool,
}

impl Engine {
    fn new(options: EngineOptions, rx: Receiver<Envelope>, dedicated: bool) -> Self {
        let embedder = HashEmbedder::new(options.embedding_dims);
        Self {
            options,
            rx,
            backlog: VecDeque::new(),
            ports: HashMap::new(),
            db: None,
            embedder,
            dedicated,
        }
    }

    fn next(&mut self) -> Option<Envelope> {
        self.backlog.pop_front().or_else(|| self.rx.recv().ok())
    }

    fn run(mut self) {
        while let Some(envelope) = self.next() {
            match envelope {
                Envelope::Connect { port, events } => {
                    self.ports.insert(port, events);
                    self.emit(
                        port,
                        EngineMessage::Checkpoint {
                            status: CheckpointStatus::Connected,
                        },
                    );
                }
                Envelope::Disconnect { port } => {
                    self.ports.remove(&port);
                    if self.dedicated && self.ports.is_empty() {
                        break;
                    }
                }
                Envelope::Message { port, message } => self.handle(port, message),
                Envelope::Shutdown => break,
            }
        }
        debug!("engine thread exiting");
    }

    fn emit(&mut self, port: PortId, message: EngineMessage) {
        let Some(events) = self.ports.get(&port) else {
            trace!(port, message = message.name(), "reply for detached port dropped");
            return;
        };
        if events.send(message).is_err() {
            trace!(port, "port receiver gone");
        }
    }

    fn handle(&mut self, port: PortId, message: MainMessage) {
        match message {
            MainMessage::Init {
                supabase_url,
                supabase_anon_key,
            } => self.init(port, &supabase_url, &supabase_anon_key),
            MainMessage::Search { query, generation } => self.search(port, &query, generation),
            MainMessage::AbortSearch => {
                trace!(port, "abort with no search in flight");
            }
        }
    }

    fn init(&mut self, port: PortId, url: &str, anon_key: &str) {
        if url.trim().is_empty() || anon_key.trim().is_empty() {
            self.emit(
                port,
                EngineMessage::Error {
                    message: "INIT requires supabaseUrl and supabaseAnonKey".to_string(),
                },
            );
            return;
        }

        if self.db.is_none() {
            let opened = match &self.options.database_path {
                Some(path) => Database::open(path),
                None => Database::open_in_memory(),
            };
            match opened {
                Ok(db) => {
                    info!(port, remote = %url, schema = db.schema_version(), "engine database opened");
                    self.db = Some(db);
                    self.emit(
                        port,
                        EngineMessage::Checkpoint {
                            status: CheckpointStatus::DatabaseOpened,
                        },
                    );
                }
                Err(err) => {
                    self.emit(
                        port,
                        EngineMessage::Error {
                            message: format!("failed to open database: {err}"),
                        },
                    );
                    return;
                }
            }
        }

        self.emit(
            port,
            EngineMessage::Checkpoint {
                status: CheckpointStatus::Ready,
            },
        );
    }

    fn search(&mut self, port: PortId, query: &str, generation: u64) {
        if self.db.is_none() {
            self.emit(
                port,
                EngineMessage::SearchError {
                    message: "engine not initialized".to_string(),
                    generation,
                },
            );
            return;
        }

        self.drain();
        if self.superseded(port) {
            debug!(port, generation, query = %query, "search superseded before start");
            return;
        }

        let outcome = match &self.db {
            Some(db) => hybrid_search(db, &self.embedder, query, &self.options.ranking),
            None => return,
        };

        self.drain();
        if self.superseded(port) {
            debug!(port, generation, query = %query, "search superseded while running; results dropped");
            return;
        }

        let reply = match outcome.and_then(|pages| Ok(serde_json::to_string(&pages)?)) {
            Ok(matches) => EngineMessage::SearchResults { matches, generation },
            Err(err) => {
                warn!(port, generation, query = %query, error = %err, "engine search failed");
                EngineMessage::SearchError {
                    message: err.to_string(),
                    generation,
                }
            }
        };
        self.emit(port, reply);
    }

    fn drain(&mut self) {
        while let Ok(envelope) = self.rx.try_recv() {
            self.backlog.push_back(envelope);
        }
    }

    /// Whether a queued abort, newer search or disconnect for `port` makes
    /// the current search pointless.
    fn superseded(&self, port: PortId) -> bool {
        self.backlog.iter().any(|envelope| match envelope {
            Envelope::Message {
                port: queued,
                message,
            } if *queued == port => match message {
                MainMessage::AbortSearch | MainMessage::Search { .. } => true,
                MainMessage::Init { .. } => false,
            },
            Envelope::Disconnect { port: queued } => *queued == port,
            _ => false,
        })
    }
}
