//! Common error types for dictionary backends

use thiserror::Error;

use crate::descriptor::DictionaryKind;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors that can occur while querying an opened dictionary backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport/communication error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote dictionary answered with a non-success status
    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Embedded database error
    #[error("Database error: {0}")]
    Database(String),

    /// Response or stored document could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout waiting for response
    #[error("Operation timed out")]
    Timeout,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Invalid backend configuration. Fatal at startup, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cve backend not configured")]
    CveNotConfigured,

    #[error(
        "{kind} backend: cannot tell the engine of connection string {url:?}, set type to mysql, postgres or redis or use an http(s):// dictionary server"
    )]
    UnsupportedConnection { kind: DictionaryKind, url: String },

    #[error("{kind} backend: invalid url {url:?}: {reason}")]
    InvalidUrl {
        kind: DictionaryKind,
        url: String,
        reason: String,
    },

    #[error("{kind} backend: type {db_type:?} requires a connection url")]
    MissingConnection {
        kind: DictionaryKind,
        db_type: String,
    },

    #[error("{kind} backend: unknown type {db_type:?} (expected sqlite3, mysql, postgres, redis or http)")]
    UnknownType {
        kind: DictionaryKind,
        db_type: String,
    },

    #[error("invalid http proxy {url:?}: {reason}")]
    InvalidProxy { url: String, reason: String },

    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),

    #[error("failed to load config file {path}: {reason}")]
    File { path: String, reason: String },
}
