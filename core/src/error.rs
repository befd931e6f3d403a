//! Error types for the account API client.
//!
//! # Design
//! Every failure is a distinct variant so callers can branch on it. A fetch
//! of a missing account is not an error at all (it yields `Ok(None)`), while
//! deleting a missing account is `NotFound`. Statuses the API does not
//! document for an operation land in `UnexpectedStatus` with the raw body
//! kept for debugging.

use thiserror::Error;

/// Errors returned by `AccountClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the request (400). Code and message are the
    /// server's, verbatim; either may be empty.
    #[error("error code: {code}, message: {message}")]
    Validation { code: String, message: String },

    /// Delete targeted an account that does not exist (404).
    #[error("specified resource does not exist")]
    NotFound,

    /// Delete carried a stale version (409). Re-fetch before retrying.
    #[error("specified version incorrect")]
    Conflict,

    /// A status the operation does not model.
    #[error("unexpected HTTP status code: {status}")]
    UnexpectedStatus { status: u16, body: String },

    /// The call never produced a response.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The request payload could not be encoded. Nothing was sent.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The response body did not have the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl ApiError {
    /// Whether repeating the call (after re-fetching, for `Conflict`) can
    /// succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Conflict)
    }
}

/// Failures below the HTTP layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The effective deadline fired before a response arrived.
    #[error("deadline exceeded: {0}")]
    Timeout(String),

    /// The caller cancelled the context before the request was sent.
    #[error("request cancelled")]
    Cancelled,

    /// DNS, connection, TLS or I/O failure.
    #[error(transparent)]
    Connection(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Errors reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
