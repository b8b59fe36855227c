//! Local search engine
//!
//! ```text
//!  coordinator ──post──▶ EngineLink ──EnginePort──▶ engine thread
//!       ▲                    │  (handshake,            │ Database + Embedder
//!       │                    │   ready flag)           │ hybrid query
//!       └─── SEARCH_* ◀──────┴──── EngineMessage ◀─────┘
//! ```

pub mod bootstrap;
pub mod host;
pub mod protocol;

pub use bootstrap::{ConfigProbe, Credentials, EngineLink, NetworkInfo, NetworkProbe, should_engage};
pub use host::{EngineHost, EngineOptions, EnginePort, PortId, open_channel};
pub use protocol::{CheckpointStatus, EngineMessage, MainMessage};
