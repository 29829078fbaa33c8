//! Unified error types for the NaturIA intermediary.
//!
//! Each variant's display string starts with a stable upper-case code that
//! callers can match on.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the intermediary and its stores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The network could not produce a response (unreachable, reset, DNS).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Neither the cache nor the network could answer a request.
    #[error("NO_RESPONSE: {0}")]
    NoResponse(String),

    /// A manifest resource could not be fetched during install.
    #[error("INSTALL_FAILED: {resource}: {reason}")]
    InstallFailed { resource: String, reason: String },

    /// A generation is not in a state that allows the operation.
    #[error("GENERATION_NOT_READY: {0}")]
    GenerationNotReady(String),

    /// The reactor has shut down or dropped a reply.
    #[error("WORKER_UNAVAILABLE: {0}")]
    WorkerUnavailable(String),

    /// Upstream application error, passed through verbatim.
    #[error("UPSTREAM_ERROR: {0}")]
    Upstream(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored data could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CacheCorrupt(String),
}

impl Error {
    /// True for failures that mean "offline" rather than a bad request.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Network(_) | Error::NoResponse(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::NoResponse(msg) => (-32008, msg.clone()),
            Error::InstallFailed { .. } => (-32020, err.to_string()),
            Error::GenerationNotReady(msg) => (-32021, msg.clone()),
            Error::WorkerUnavailable(msg) => (-32022, msg.clone()),
            Error::Upstream(msg) => (-32000, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CacheCorrupt(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
