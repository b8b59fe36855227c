//! Error handling for docsearch.
//!
//! This module provides:
//! - [`DocsError`]: The main error enum for all docsearch operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Error shape used for `--json` output

mod codes;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;

/// Main error type for docsearch operations.
#[derive(Error, Debug)]
pub enum DocsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Local engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Engine channel closed")]
    ChannelClosed,

    /// Sentinel for superseded work. Never surfaced as a failure.
    #[error("Request intentionally aborted")]
    Aborted,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl DocsError {
    /// Get the error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Serialization(_) => ErrorCode::SerializationError,
            Self::Http(_) => ErrorCode::NetworkUnreachable,
            Self::Remote { .. } => ErrorCode::RemoteRejected,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::InvalidQuery(_) => ErrorCode::SearchQueryInvalid,
            Self::Protocol(_) => ErrorCode::ProtocolViolation,
            Self::EngineUnavailable(_) => ErrorCode::EngineUnavailable,
            Self::ChannelClosed => ErrorCode::ChannelClosed,
            Self::Aborted => ErrorCode::SearchAborted,
            Self::NotFound(_) => ErrorCode::NotFound,
        }
    }

    /// Whether this error is the cancellation sentinel.
    #[must_use]
    pub const fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::Remote { status, message } => {
                Some(serde_json::json!({ "status": status, "message": message }))
            }
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_docs_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "CONFIG_INVALID")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 302)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "config", "engine", "network")
    pub category: String,
}

impl StructuredError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_docs_error(err: &DocsError) -> Self {
        let mut structured = Self::new(err.code(), err.to_string());
        structured.context = err.context();
        structured
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&DocsError> for StructuredError {
    fn from(err: &DocsError) -> Self {
        Self::from_docs_error(err)
    }
}

/// Result type alias using DocsError.
pub type Result<T> = std::result::Result<T, DocsError>;
