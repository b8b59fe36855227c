use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Load config: explicit path (or `DOCSEARCH_CONFIG`) wins, otherwise the
    /// global file is layered under the project file. Env overrides apply last.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("DOCSEARCH_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(project_root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("docsearch/config.toml"))
    }

    fn load_project(project_root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&project_root.join(".docsearch/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| DocsError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| DocsError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.engine {
            self.engine.merge(patch);
        }
        if let Some(patch) = patch.remote {
            self.remote.merge(patch);
        }
        if let Some(patch) = patch.ranking {
            self.ranking.merge(patch);
        }
        if let Some(patch) = patch.network {
            self.network.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_bool("DOCSEARCH_ENGINE_ENABLED") {
            self.engine.enabled = value;
        }
        if let Some(value) = env_string("DOCSEARCH_ENGINE_DATABASE_PATH") {
            self.engine.database_path = PathBuf::from(value);
        }
        if let Some(value) = env_string("DOCSEARCH_ENGINE_CHANNEL") {
            self.engine.channel = parse_channel_kind(&value)?;
        }
        if let Some(value) = env_u32("DOCSEARCH_ENGINE_EMBEDDING_DIMS")? {
            self.engine.embedding_dims = value;
        }

        if let Some(value) = env_string("DOCSEARCH_REMOTE_URL") {
            self.remote.url = value;
        }
        if let Some(value) = env_string("DOCSEARCH_REMOTE_ANON_KEY") {
            self.remote.anon_key = value;
        }
        if let Some(value) = env_string("DOCSEARCH_REMOTE_LEXICAL_RPC") {
            self.remote.lexical_rpc = value;
        }
        if let Some(value) = env_string("DOCSEARCH_REMOTE_EMBEDDING_PATH") {
            self.remote.embedding_path = value;
        }
        if let Some(value) = env_u64("DOCSEARCH_REMOTE_TIMEOUT_SECS")? {
            self.remote.timeout_secs = value;
        }

        if let Some(value) = env_f32("DOCSEARCH_RANKING_MATCH_THRESHOLD")? {
            self.ranking.match_threshold = value;
        }
        if let Some(value) = env_u32("DOCSEARCH_RANKING_RESULT_LIMIT")? {
            self.ranking.result_limit = value;
        }
        if let Some(value) = env_f32("DOCSEARCH_RANKING_LEXICAL_SCALE")? {
            self.ranking.lexical_scale = value;
        }

        if let Some(value) = env_bool("DOCSEARCH_NETWORK_SAVE_DATA") {
            self.network.save_data = value;
        }
        if let Some(value) = env_string("DOCSEARCH_NETWORK_EFFECTIVE_TYPE") {
            self.network.effective_type = value;
        }

        Ok(())
    }

    /// Reject values the engine or ranking query cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.engine.embedding_dims == 0 {
            return Err(DocsError::Config(
                "engine.embedding_dims must be greater than 0".to_string(),
            ));
        }
        let ranking = &self.ranking;
        if ranking.semantic_limit == 0 || ranking.lexical_limit == 0 || ranking.result_limit == 0 {
            return Err(DocsError::Config(
                "ranking limits must be greater than 0".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&ranking.match_threshold) {
            return Err(DocsError::Config(format!(
                "ranking.match_threshold must be within [-1, 1], got {}",
                ranking.match_threshold
            )));
        }
        if ranking.lexical_scale <= 0.0 || ranking.semantic_scale <= 0.0 {
            return Err(DocsError::Config(
                "ranking scales must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// How the local engine channel is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// One engine per coordinator; stops when the port closes.
    #[default]
    Dedicated,
    /// Ports attach to an engine host shared by several coordinators.
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub database_path: PathBuf,
    #[serde(default)]
    pub channel: ChannelKind,
    #[serde(default)]
    pub embedding_dims: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let database_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docsearch/docs.db");
        Self {
            enabled: true,
            database_path,
            channel: ChannelKind::Dedicated,
            embedding_dims: 384,
        }
    }
}

impl EngineConfig {
    fn merge(&mut self, patch: EnginePatch) {
        if let Some(value) = patch.enabled {
            self.enabled = value;
        }
        if let Some(value) = patch.database_path {
            self.database_path = value;
        }
        if let Some(value) = patch.channel {
            self.channel = value;
        }
        if let Some(value) = patch.embedding_dims {
            self.embedding_dims = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default)]
    pub lexical_rpc: String,
    #[serde(default)]
    pub embedding_path: String,
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            lexical_rpc: "docs_search_fts".to_string(),
            embedding_path: "functions/v1/search-embeddings".to_string(),
            timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    fn merge(&mut self, patch: RemotePatch) {
        if let Some(value) = patch.url {
            self.url = value;
        }
        if let Some(value) = patch.anon_key {
            self.anon_key = value;
        }
        if let Some(value) = patch.lexical_rpc {
            self.lexical_rpc = value;
        }
        if let Some(value) = patch.embedding_path {
            self.embedding_path = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
    }

    /// Whether enough is configured to reach the remote at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

/// Tunables for the hybrid ranking query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Minimum cosine similarity for a section to count as a semantic hit
    #[serde(default)]
    pub match_threshold: f32,
    #[serde(default)]
    pub semantic_limit: u32,
    #[serde(default)]
    pub lexical_limit: u32,
    #[serde(default)]
    pub result_limit: u32,
    /// Multiplier applied to the raw bm25 rank before capping at 1
    #[serde(default)]
    pub lexical_scale: f32,
    /// Multiplier applied to cosine similarity
    #[serde(default)]
    pub semantic_scale: f32,
    #[serde(default)]
    pub title_weight: f32,
    #[serde(default)]
    pub subtitle_weight: f32,
    #[serde(default)]
    pub description_weight: f32,
    #[serde(default)]
    pub body_weight: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.78,
            semantic_limit: 10,
            lexical_limit: 20,
            result_limit: 10,
            lexical_scale: 0.1,
            semantic_scale: 100.0,
            title_weight: 10.0,
            subtitle_weight: 5.0,
            description_weight: 2.0,
            body_weight: 1.0,
        }
    }
}

impl RankingConfig {
    fn merge(&mut self, patch: RankingPatch) {
        if let Some(value) = patch.match_threshold {
            self.match_threshold = value;
        }
        if let Some(value) = patch.semantic_limit {
            self.semantic_limit = value;
        }
        if let Some(value) = patch.lexical_limit {
            self.lexical_limit = value;
        }
        if let Some(value) = patch.result_limit {
            self.result_limit = value;
        }
        if let Some(value) = patch.lexical_scale {
            self.lexical_scale = value;
        }
        if let Some(value) = patch.semantic_scale {
            self.semantic_scale = value;
        }
        if let Some(value) = patch.title_weight {
            self.title_weight = value;
        }
        if let Some(value) = patch.subtitle_weight {
            self.subtitle_weight = value;
        }
        if let Some(value) = patch.description_weight {
            self.description_weight = value;
        }
        if let Some(value) = patch.body_weight {
            self.body_weight = value;
        }
    }
}

/// Ambient connection-quality signal.
///
/// An empty `effective_type` means the signal is unavailable on this host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub save_data: bool,
    #[serde(default)]
    pub effective_type: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            save_data: false,
            effective_type: "4g".to_string(),
        }
    }
}

impl NetworkConfig {
    fn merge(&mut self, patch: NetworkPatch) {
        if let Some(value) = patch.save_data {
            self.save_data = value;
        }
        if let Some(value) = patch.effective_type {
            self.effective_type = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub engine: Option<EnginePatch>,
    pub remote: Option<RemotePatch>,
    pub ranking: Option<RankingPatch>,
    pub network: Option<NetworkPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EnginePatch {
    pub enabled: Option<bool>,
    pub database_path: Option<PathBuf>,
    pub channel: Option<ChannelKind>,
    pub embedding_dims: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RemotePatch {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub lexical_rpc: Option<String>,
    pub embedding_path: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RankingPatch {
    pub match_threshold: Option<f32>,
    pub semantic_limit: Option<u32>,
    pub lexical_limit: Option<u32>,
    pub result_limit: Option<u32>,
    pub lexical_scale: Option<f32>,
    pub semantic_scale: Option<f32>,
    pub title_weight: Option<f32>,
    pub subtitle_weight: Option<f32>,
    pub description_weight: Option<f32>,
    pub body_weight: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NetworkPatch {
    pub save_data: Option<bool>,
    pub effective_type: Option<String>,
}

fn parse_channel_kind(value: &str) -> Result<ChannelKind> {
    match value.to_lowercase().as_str() {
        "dedicated" => Ok(ChannelKind::Dedicated),
        "shared" => Ok(ChannelKind::Shared),
        _ => Err(DocsError::Config(format!(
            "invalid engine channel {value} (expected dedicated|shared)"
        ))),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u32>().map(Some).map_err(|err| {
            DocsError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            DocsError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<f32>().map(Some).map_err(|err| {
            DocsError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}
