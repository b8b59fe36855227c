//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 3xx: Config errors
//! - 4xx: Search errors
//! - 5xx: Network / remote errors
//! - 6xx: Storage errors
//! - 7xx: Local engine errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for `--json` output.
///
/// Each variant maps to a numeric code (e.g., `ConfigInvalid` -> E302).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Config file not found
    ConfigNotFound,
    /// E302: Config file has invalid syntax or values
    ConfigInvalid,
    /// E304: Required config value is missing
    ConfigMissingRequired,

    // ========================================
    // Search errors (4xx)
    // ========================================
    /// E401: Search query is empty or otherwise unusable
    SearchQueryInvalid,
    /// E402: Search was superseded by a newer query
    SearchAborted,

    // ========================================
    // Network errors (5xx)
    // ========================================
    /// E501: Cannot reach remote server
    NetworkUnreachable,
    /// E502: Remote answered with a non-success status
    RemoteRejected,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E604: Database operation failed
    DatabaseError,
    /// E605: Serialization/deserialization failed
    SerializationError,

    // ========================================
    // Engine errors (7xx)
    // ========================================
    /// E701: Local engine is not engaged or not ready
    EngineUnavailable,
    /// E702: Message violated the engine protocol
    ProtocolViolation,
    /// E703: Engine channel closed underneath us
    ChannelClosed,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E905: Generic not found
    NotFound,
    /// E906: IO operation failed
    IoError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `ConfigInvalid` -> 302).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::ConfigNotFound => 301,
            Self::ConfigInvalid => 302,
            Self::ConfigMissingRequired => 304,

            Self::SearchQueryInvalid => 401,
            Self::SearchAborted => 402,

            Self::NetworkUnreachable => 501,
            Self::RemoteRejected => 502,

            Self::DatabaseError => 604,
            Self::SerializationError => 605,

            Self::EngineUnavailable => 701,
            Self::ProtocolViolation => 702,
            Self::ChannelClosed => 703,

            Self::NotFound => 905,
            Self::IoError => 906,
        }
    }

    /// Get the error code as a formatted string (e.g., "E302").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::ConfigNotFound => "Pass --config <path> or create ~/.config/docsearch/config.toml",
            Self::ConfigInvalid => "Run `docsearch config` to see current values. Check TOML syntax in config file",
            Self::ConfigMissingRequired => "Set the missing value in config.toml or via its DOCSEARCH_* environment variable",

            Self::SearchQueryInvalid => "Provide a non-empty search query",
            Self::SearchAborted => "A newer search replaced this one; nothing to do",

            Self::NetworkUnreachable => "Check your network connection and the [remote].url setting",
            Self::RemoteRejected => "Verify [remote].anon_key and that the search endpoints are deployed",

            Self::DatabaseError => "Check [engine].database_path. Re-run `docsearch ingest` to rebuild the local index",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",

            Self::EngineUnavailable => "The local engine is disabled or still starting; the remote path will be used",
            Self::ProtocolViolation => "The engine sent an unexpected message. Please report this issue",
            Self::ChannelClosed => "The local engine stopped. Restart the application",

            Self::NotFound => "The requested resource was not found. Check the path or identifier",
            Self::IoError => "File operation failed. Check path exists and permissions are correct",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::ConfigNotFound
            | Self::ConfigInvalid
            | Self::ConfigMissingRequired
            | Self::SearchQueryInvalid
            | Self::SearchAborted
            | Self::NetworkUnreachable
            | Self::RemoteRejected
            | Self::EngineUnavailable
            | Self::NotFound
            | Self::IoError => true,

            Self::DatabaseError
            | Self::SerializationError
            | Self::ProtocolViolation
            | Self::ChannelClosed => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            3 => "config",
            4 => "search",
            5 => "network",
            6 => "storage",
            7 => "engine",
            9 => "internal",
            _ => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
