use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use docsearch::engine::{
    Credentials, EngineHost, EngineLink, EngineOptions, NetworkInfo, NetworkProbe,
};
use docsearch::remote::HttpRemote;
use docsearch::search::{HashEmbedder, RankingParams, ReducerVariant, SearchCoordinator, SearchStore};
use docsearch::storage::{Database, IngestDocument, ingest};

pub const DIMS: usize = 128;

pub const DOCS: &str = r#"{
    "pages": [
        {
            "path": "/guides/auth",
            "type": "markdown",
            "meta": { "title": "Auth", "description": "Sign users in and manage sessions" },
            "content": "Auth overview. Passwords, magic links and social providers.",
            "sections": [
                { "slug": "passwords", "heading": "Passwords", "content": "Sign in users with email and password auth" },
                { "slug": "magic-links", "heading": "Magic links", "content": "Passwordless login over email" }
            ]
        },
        {
            "path": "/guides/row-level-security",
            "type": "markdown",
            "meta": { "title": "Row Level Security", "subtitle": "Secure your tables" },
            "content": "Policies can reference auth uid to restrict rows to their owner.",
            "sections": [
                { "slug": "policies", "heading": "Policies", "content": "Write policies using the auth uid helper" }
            ]
        },
        {
            "path": "/reference/errors",
            "type": "reference",
            "meta": { "title": "Error codes" },
            "content": "PGRST116 means the query returned no rows.",
            "sections": [
                { "slug": "pgrst116", "heading": "PGRST116", "content": "No rows returned for a single row request" }
            ]
        }
    ]
}"#;

/// Engine database seeded with [`DOCS`] in a temporary directory.
pub struct Fixture {
    pub dir: TempDir,
    pub db_path: PathBuf,
}

impl Fixture {
    pub fn seeded() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let db_path = dir.path().join("docs.db");
        seed(&db_path);
        Self { dir, db_path }
    }

    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            database_path: Some(self.db_path.clone()),
            embedding_dims: DIMS,
            ranking: RankingParams::default(),
        }
    }
}

pub fn seed(path: &Path) {
    let mut db = Database::open(path).expect("open database");
    let doc: IngestDocument = serde_json::from_str(DOCS).expect("parse fixture docs");
    ingest(&mut db, &HashEmbedder::new(DIMS), doc).expect("ingest fixture docs");
}

/// Probe reporting a fast connection.
pub struct FastNetwork;

impl NetworkProbe for FastNetwork {
    fn probe(&self) -> Option<NetworkInfo> {
        Some(NetworkInfo {
            save_data: false,
            effective_type: "4g".into(),
        })
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        url: "https://docs.example.co".into(),
        anon_key: "anon-key".into(),
    }
}

/// Local-only coordinator over a dedicated engine, waited until ready.
pub async fn local_coordinator(options: EngineOptions) -> SearchCoordinator<HttpRemote> {
    let store = Arc::new(SearchStore::new(ReducerVariant::LocalOnly));
    let coordinator = SearchCoordinator::with_engine(store, None, |replies| {
        EngineLink::start(
            &FastNetwork,
            move || EngineHost::spawn_dedicated(options)?.connect(),
            credentials(),
            replies,
        )
    });

    let engine = coordinator.engine().expect("engine link");
    tokio::time::timeout(Duration::from_secs(10), engine.wait_ready())
        .await
        .expect("engine ready in time")
        .expect("engine handshake");
    coordinator
}

pub async fn settle(coordinator: &SearchCoordinator<HttpRemote>) {
    tokio::time::timeout(Duration::from_secs(10), coordinator.settled())
        .await
        .expect("coordinator did not settle");
}
