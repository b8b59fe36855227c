//! Remote search collaborators
//!
//! When the local engine is skipped or not ready yet, the coordinator races
//! two remote calls: a lexical RPC and an embedding-search endpoint. Both
//! take `{ "query": ... }` and answer with raw result rows that go through
//! the normalizer unchanged.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RemoteConfig;
use crate::error::{DocsError, Result};

/// The two remote legs of a dual-source search.
pub trait RemoteSearch: Send + Sync + 'static {
    /// Full-text RPC. Rows carry no headings or slugs.
    fn lexical(&self, query: &str) -> impl Future<Output = Result<Value>> + Send;

    /// Remote embedding search. Rows may carry parallel heading/slug arrays.
    fn semantic(&self, query: &str) -> impl Future<Output = Result<Value>> + Send;
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

/// Error bodies can be whole HTML pages; keep log lines bounded.
const MAX_ERROR_BODY: usize = 256;

/// HTTP implementation against a Supabase-style backend.
#[derive(Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    lexical_rpc: String,
    embedding_path: String,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .field("lexical_rpc", &self.lexical_rpc)
            .field("embedding_path", &self.embedding_path)
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(DocsError::MissingConfig(
                "remote.url and remote.anon_key are required for remote search".to_string(),
            ));
        }
        if config.url.starts_with("http://") {
            warn!("Remote search URL uses unencrypted HTTP. The anon key will be sent in plain text.");
        }

        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DocsError::Config(format!("remote http client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            lexical_rpc: config.lexical_rpc.clone(),
            embedding_path: config.embedding_path.trim_start_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn lexical_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, self.lexical_rpc)
    }

    #[must_use]
    pub fn embedding_url(&self) -> String {
        format!("{}/{}", self.base_url, self.embedding_path)
    }

    async fn post_query(&self, url: String, query: &str) -> Result<Value> {
        debug!(url = %url, query = %query, "remote search request");
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&QueryBody { query })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(DocsError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

impl RemoteSearch for HttpRemote {
    fn lexical(&self, query: &str) -> impl Future<Output = Result<Value>> + Send {
        self.post_query(self.lexical_url(), query)
    }

    fn semantic(&self, query: &str) -> impl Future<Output = Result<Value>> + Send {
        self.post_query(self.embedding_url(), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config_for(server: &MockServer) -> RemoteConfig {
        RemoteConfig {
            url: server.base_url(),
            anon_key: "anon-key".to_string(),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn from_config_requires_url_and_key() {
        let err = HttpRemote::from_config(&RemoteConfig::default()).unwrap_err();
        assert!(matches!(err, DocsError::MissingConfig(_)));
    }

    #[test]
    fn urls_are_built_from_config() {
        let remote = HttpRemote::from_config(&RemoteConfig {
            url: "https://docs.example.co/".to_string(),
            anon_key: "k".to_string(),
            ..RemoteConfig::default()
        })
        .unwrap();

        assert_eq!(
            remote.lexical_url(),
            "https://docs.example.co/rest/v1/rpc/docs_search_fts"
        );
        assert_eq!(
            remote.embedding_url(),
            "https://docs.example.co/functions/v1/search-embeddings"
        );
    }

    #[tokio::test]
    async fn lexical_posts_query_with_auth_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/rpc/docs_search_fts")
                    .header("apikey", "anon-key")
                    .header("authorization", "Bearer anon-key")
                    .json_body(json!({ "query": "auth" }));
                then.status(200).json_body(json!([
                    { "id": 1, "path": "/guides/auth", "type": "markdown", "title": "Auth" }
                ]));
            })
            .await;

        let remote = HttpRemote::from_config(&config_for(&server)).unwrap();
        let rows = remote.lexical("auth").await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows[0]["path"], "/guides/auth");
    }

    #[tokio::test]
    async fn semantic_posts_to_embedding_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/functions/v1/search-embeddings")
                    .json_body(json!({ "query": "storage" }));
                then.status(200).json_body(json!([{
                    "id": 2,
                    "path": "/guides/storage",
                    "type": "markdown",
                    "title": "Storage",
                    "headings": ["Uploads"],
                    "slugs": ["uploads"]
                }]));
            })
            .await;

        let remote = HttpRemote::from_config(&config_for(&server)).unwrap();
        let rows = remote.semantic("storage").await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows[0]["headings"][0], "Uploads");
    }

    #[tokio::test]
    async fn non_success_status_maps_to_remote_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/rpc/docs_search_fts");
                then.status(503).body("upstream unavailable");
            })
            .await;

        let remote = HttpRemote::from_config(&config_for(&server)).unwrap();
        let err = remote.lexical("auth").await.unwrap_err();

        match err {
            DocsError::Remote { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_body_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/functions/v1/search-embeddings");
                then.status(200).body("not json");
            })
            .await;

        let remote = HttpRemote::from_config(&config_for(&server)).unwrap();
        assert!(remote.semantic("auth").await.is_err());
    }
}
