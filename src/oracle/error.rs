//! Oracle error types

use thiserror::Error;

/// Error from an oracle call, with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct OracleError {
    pub kind: OracleErrorKind,
    pub message: String,
}

/// Classification of oracle errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleErrorKind {
    /// Connection failures, timeouts
    Network,
    /// Provider rate limit (429)
    RateLimit,
    /// Provider-side failure (500-599)
    ServerError,
    /// Invalid or expired credentials (401)
    Auth,
    /// Malformed request rejected by the provider (400)
    InvalidRequest,
    /// Completion did not satisfy the expense schema
    Schema,
    /// Anything else
    Unknown,
}

impl OracleError {
    pub fn new(kind: OracleErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::InvalidRequest, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::Schema, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(OracleErrorKind::Unknown, message)
    }
}
