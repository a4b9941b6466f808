//! Result types returned by the timestamping contract.
//!
//! Both types are immutable once built and can only be constructed through
//! their success/failure factories, so a result is never half-populated.
//! They serialise as JSON for callers that persist certification outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, TrustError};

// ---------------------------------------------------------------------------
// Timestamp request outcome
// ---------------------------------------------------------------------------

/// Outcome of a single `request_timestamp` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsaResult {
    success: bool,
    timestamp_token: Option<Vec<u8>>,
    timestamp_date: Option<DateTime<Utc>>,
    message_imprint: Option<String>,
    server_url: String,
    provider_name: String,
    error_kind: Option<ErrorKind>,
    error_message: Option<String>,
    warning: Option<String>,
    elapsed_ms: u64,
}

/// Successful-token payload passed to [`TsaResult::ok`].
#[derive(Debug, Clone)]
pub struct GrantedToken {
    /// Raw DER `TimeStampToken` bytes.
    pub token: Vec<u8>,
    /// Signing time reported by the TSA (or local clock on fallback).
    pub timestamp_date: DateTime<Utc>,
    /// Lowercase hex message imprint.
    pub message_imprint: String,
    /// Non-fatal parse warning, if the date or imprint had to be approximated.
    pub warning: Option<String>,
}

impl TsaResult {
    /// Build a successful result.
    pub fn ok(
        granted: GrantedToken,
        server_url: impl Into<String>,
        provider_name: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            success: true,
            timestamp_token: Some(granted.token),
            timestamp_date: Some(granted.timestamp_date),
            message_imprint: Some(granted.message_imprint),
            server_url: server_url.into(),
            provider_name: provider_name.into(),
            error_kind: None,
            error_message: None,
            warning: granted.warning,
            elapsed_ms,
        }
    }

    /// Build a failed result from a [`TrustError`].
    pub fn error(
        error: &TrustError,
        server_url: impl Into<String>,
        provider_name: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            success: false,
            timestamp_token: None,
            timestamp_date: None,
            message_imprint: None,
            server_url: server_url.into(),
            provider_name: provider_name.into(),
            error_kind: Some(error.kind()),
            error_message: Some(error.to_string()),
            warning: None,
            elapsed_ms,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn timestamp_token(&self) -> Option<&[u8]> {
        self.timestamp_token.as_deref()
    }

    pub fn timestamp_date(&self) -> Option<DateTime<Utc>> {
        self.timestamp_date
    }

    pub fn message_imprint(&self) -> Option<&str> {
        self.message_imprint.as_deref()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Taxonomy category of the failure; `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Parse warning attached to a degraded (but successful) result.
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// [`ErrorKind::ParseWarning`] when a warning is attached.
    ///
    /// Kept apart from [`error_kind`](Self::error_kind), which is `None` on
    /// every success.
    pub fn warning_kind(&self) -> Option<ErrorKind> {
        self.warning.as_ref().map(|_| ErrorKind::ParseWarning)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

// ---------------------------------------------------------------------------
// Verification outcome
// ---------------------------------------------------------------------------

/// Outcome of verifying a stored token against the original content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TsaVerifyResult {
    is_valid: bool,
    timestamp_date: Option<DateTime<Utc>>,
    message_imprint: Option<String>,
    error_message: Option<String>,
}

impl TsaVerifyResult {
    /// The token matches the content.
    ///
    /// `timestamp_date` is `None` when the token's signing time could not be
    /// read; the imprint match alone decides validity.
    pub fn valid(
        timestamp_date: Option<DateTime<Utc>>,
        message_imprint: impl Into<String>,
    ) -> Self {
        Self {
            is_valid: true,
            timestamp_date,
            message_imprint: Some(message_imprint.into()),
            error_message: None,
        }
    }

    /// The token is unreadable or does not match the content.
    ///
    /// `message_imprint` is the imprint found in the token, when one was.
    pub fn invalid(message_imprint: Option<String>, error_message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            timestamp_date: None,
            message_imprint,
            error_message: Some(error_message.into()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn timestamp_date(&self) -> Option<DateTime<Utc>> {
        self.timestamp_date
    }

    pub fn message_imprint(&self) -> Option<&str> {
        self.message_imprint.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}
