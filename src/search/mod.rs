//! Documentation search
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                 SearchCoordinator::search(query)               │
//! └────────────────────────────────────────────────────────────────┘
//!              │ engine ready                     │ otherwise
//!              ▼                                  ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────────┐
//! │   Local engine (hybrid.rs)   │  │  Remote legs, raced          │
//! │   semantic + lexical, fused  │  │  lexical RPC | embeddings    │
//! └──────────────────────────────┘  └──────────────────────────────┘
//!              │                                  │
//!              └───────────────┬──────────────────┘
//!                              ▼
//!              ┌───────────────────────────────┐
//!              │ SearchStore::dispatch         │
//!              │   normalize + reduce          │
//!              └───────────────────────────────┘
//!                              │
//!                              ▼
//!                       SearchState (watch)
//! ```

pub mod coordinator;
pub mod embeddings;
pub mod hybrid;
pub mod result;
pub mod state;
pub mod store;

pub use coordinator::SearchCoordinator;
pub use embeddings::{Embedder, HashEmbedder, build_embedder, cosine_similarity};
pub use hybrid::{HybridQuery, RankedPage, RankingParams, fts_match_expression, hybrid_search};
pub use result::{Heading, PageType, SearchResult, normalize};
pub use state::{ActionKind, ReducerVariant, SearchAction, SearchState, StateKind, reduce};
pub use store::SearchStore;
