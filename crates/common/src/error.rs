//! Common error types shared across crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a trust-layer failure.
///
/// Carried on failed [`TsaResult`](crate::protocol::TsaResult)s so callers can
/// decide on retry without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed key, credentials, or other settings.
    Configuration,
    /// Encryption key is not exactly 32 bytes.
    InvalidKeyLength,
    /// Connection failure or other transport-level error.
    Transport,
    /// The per-call deadline elapsed before the TSA answered.
    Timeout,
    /// The TSA rejected our credentials (HTTP 401).
    Authentication,
    /// The TSA answered with a non-2xx status other than 401.
    HttpStatus,
    /// Non-granted TSA status, malformed DER, or imprint mismatch.
    Protocol,
    /// Non-fatal; downgrades date precision but not success.
    ParseWarning,
}

impl ErrorKind {
    /// Returns `true` for categories where re-attempting the same call later
    /// may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Transport | ErrorKind::Timeout | ErrorKind::HttpStatus
        )
    }
}

/// Top-level trust-layer error type.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Missing or malformed configuration (key, credentials, URL, OID).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The encryption key has the wrong length.
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Connection failure or other transport problem.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The remote service rejected our credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote service answered with an unexpected HTTP status.
    #[error("unexpected HTTP status {status}: {message}")]
    HttpStatus {
        /// HTTP status code returned by the server.
        status: u16,
        /// Reason phrase or short body excerpt.
        message: String,
    },

    /// The response violated the RFC 3161 protocol or was not granted.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TrustError {
    /// Returns the taxonomy category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrustError::Configuration(_) => ErrorKind::Configuration,
            TrustError::InvalidKeyLength(_) => ErrorKind::InvalidKeyLength,
            TrustError::Transport(_) => ErrorKind::Transport,
            TrustError::Timeout(_) => ErrorKind::Timeout,
            TrustError::Authentication(_) => ErrorKind::Authentication,
            TrustError::HttpStatus { .. } => ErrorKind::HttpStatus,
            TrustError::Protocol(_) => ErrorKind::Protocol,
        }
    }
}
