//! Engine bootstrap: decide whether to use the local engine, open its
//! channel off the interactive path, run the handshake, publish readiness.
//!
//! Readiness only flips to `true` on `CHECKPOINT{READY}`. A channel or engine
//! error is logged and leaves the link not ready; the coordinator then keeps
//! using the remote path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::host::EnginePort;
use super::protocol::{CheckpointStatus, EngineMessage, MainMessage};
use crate::config::{NetworkConfig, RemoteConfig};
use crate::error::{DocsError, Result};

/// Connection-quality snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub save_data: bool,
    pub effective_type: String,
}

/// Source of the connection-quality signal.
pub trait NetworkProbe: Send + Sync {
    /// `None` when the platform offers no signal.
    fn probe(&self) -> Option<NetworkInfo>;
}

/// Probe backed by the `[network]` config section.
#[derive(Debug, Clone)]
pub struct ConfigProbe {
    network: NetworkConfig,
}

impl ConfigProbe {
    #[must_use]
    pub const fn new(network: NetworkConfig) -> Self {
        Self { network }
    }
}

impl NetworkProbe for ConfigProbe {
    fn probe(&self) -> Option<NetworkInfo> {
        let effective_type = self.network.effective_type.trim();
        if effective_type.is_empty() {
            return None;
        }
        Some(NetworkInfo {
            save_data: self.network.save_data,
            effective_type: effective_type.to_lowercase(),
        })
    }
}

/// The local engine is only worth it on a fast connection without
/// data-saver; an unknown connection counts as unfavorable.
#[must_use]
pub fn should_engage(info: Option<&NetworkInfo>) -> bool {
    info.is_some_and(|info| !info.save_data && info.effective_type == "4g")
}

/// Credentials carried by `INIT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub anon_key: String,
}

impl From<&RemoteConfig> for Credentials {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            url: config.url.clone(),
            anon_key: config.anon_key.clone(),
        }
    }
}

struct LinkInner {
    skip_engine: bool,
    ready: watch::Sender<bool>,
    port: Mutex<Option<EnginePort>>,
    closed: AtomicBool,
}

/// The coordinator's view of the local engine channel.
pub struct EngineLink {
    inner: Arc<LinkInner>,
    pump: Mutex<Option<JoinHandle<()>>>,
    aborts_posted: AtomicU64,
}

impl std::fmt::Debug for EngineLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLink")
            .field("skip_engine", &self.inner.skip_engine)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl EngineLink {
    /// Decide on engagement and, if engaged, open the channel on a spawned
    /// task after yielding to the scheduler.
    ///
    /// Search replies from the engine are forwarded to `replies`; lifecycle
    /// events are consumed here. Must be called inside a tokio runtime.
    pub fn start<F>(
        probe: &dyn NetworkProbe,
        open: F,
        credentials: Credentials,
        replies: mpsc::UnboundedSender<EngineMessage>,
    ) -> Self
    where
        F: FnOnce() -> Result<EnginePort> + Send + 'static,
    {
        let info = probe.probe();
        let engage = should_engage(info.as_ref());
        let (ready, _) = watch::channel(false);
        let inner = Arc::new(LinkInner {
            skip_engine: !engage,
            ready,
            port: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        if !engage {
            info!(network = ?info, "local engine skipped for this session");
            return Self {
                inner,
                pump: Mutex::new(None),
                aborts_posted: AtomicU64::new(0),
            };
        }

        let task_inner = Arc::clone(&inner);
        let pump = tokio::spawn(async move {
            tokio::task::yield_now().await;
            run_link(task_inner, open, credentials, replies).await;
        });

        Self {
            inner,
            pump: Mutex::new(Some(pump)),
            aborts_posted: AtomicU64::new(0),
        }
    }

    /// A link that never engages the engine.
    #[must_use]
    pub fn disabled() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Arc::new(LinkInner {
                skip_engine: true,
                ready,
                port: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
            pump: Mutex::new(None),
            aborts_posted: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn skip_engine(&self) -> bool {
        self.inner.skip_engine
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Resolve once the handshake completes. Errors if the link shuts down
    /// first.
    pub async fn wait_ready(&self) -> Result<()> {
        let inner = &self.inner;
        let mut rx = inner.ready.subscribe();
        rx.wait_for(|ready| *ready || inner.closed.load(Ordering::Acquire))
            .await
            .map_err(|_| DocsError::ChannelClosed)?;
        if inner.closed.load(Ordering::Acquire) {
            return Err(DocsError::ChannelClosed);
        }
        Ok(())
    }

    /// Post a message on the engine channel.
    pub fn post(&self, message: MainMessage) -> Result<()> {
        let is_abort = message == MainMessage::AbortSearch;
        match self.inner.port.lock().as_ref() {
            Some(port) => port.post(message)?,
            None => {
                return Err(DocsError::EngineUnavailable(
                    "engine channel not open".to_string(),
                ));
            }
        }
        if is_abort {
            self.aborts_posted.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Number of `ABORT_SEARCH` messages delivered to the channel.
    #[must_use]
    pub fn aborts_posted(&self) -> u64 {
        self.aborts_posted.load(Ordering::Relaxed)
    }

    /// Close the channel and stop listening. Safe to call repeatedly.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(port) = self.inner.port.lock().take() {
            port.close();
        }
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.inner.ready.send_replace(false);
        debug!("engine link shut down");
    }
}

impl Drop for EngineLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_link<F>(
    inner: Arc<LinkInner>,
    open: F,
    credentials: Credentials,
    replies: mpsc::UnboundedSender<EngineMessage>,
) where
    F: FnOnce() -> Result<EnginePort>,
{
    if inner.closed.load(Ordering::Acquire) {
        return;
    }

    let mut port = match open() {
        Ok(port) => port,
        Err(err) => {
            warn!(error = %err, "failed to open engine channel");
            return;
        }
    };
    let Some(mut events) = port.take_events() else {
        warn!("engine channel has no event stream");
        return;
    };

    {
        let mut slot = inner.port.lock();
        if inner.closed.load(Ordering::Acquire) {
            port.close();
            return;
        }
        *slot = Some(port);
    }

    while let Some(event) = events.recv().await {
        match event {
            EngineMessage::Checkpoint { status } => {
                info!(status = ?status, "engine checkpoint");
                match status {
                    CheckpointStatus::Connected => {
                        let init = MainMessage::Init {
                            supabase_url: credentials.url.clone(),
                            supabase_anon_key: credentials.anon_key.clone(),
                        };
                        let posted = inner
                            .port
                            .lock()
                            .as_ref()
                            .map(|port| port.post(init));
                        if let Some(Err(err)) = posted {
                            warn!(error = %err, "failed to send INIT");
                        }
                    }
                    CheckpointStatus::Ready => {
                        inner.ready.send_replace(true);
                    }
                    CheckpointStatus::DatabaseOpened => {}
                }
            }
            EngineMessage::Error { message } => {
                warn!(message = %message, "engine error");
            }
            reply @ (EngineMessage::SearchResults { .. } | EngineMessage::SearchError { .. }) => {
                if replies.send(reply).is_err() {
                    debug!("search reply dropped; coordinator gone");
                }
            }
        }
    }

    inner.ready.send_replace(false);
    debug!("engine event stream ended");
}
