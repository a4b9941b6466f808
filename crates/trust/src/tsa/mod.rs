//! RFC 3161 timestamping.
//!
//! [`TsaProvider`] is the capability callers depend on. Two variants exist:
//! [`FreeTsaProvider`] (unqualified, development) and [`ArubaProvider`]
//! (qualified, production). The active one is chosen once at start-up by
//! [`build_provider`].
//!
//! Provider calls never return `Err`: every outcome, including network and
//! configuration failures, is described by the returned result value.

pub mod aruba;
pub mod client;
pub mod free;
pub mod transport;
pub mod verify;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{TsaResult, TsaVerifyResult};
use serde::Deserialize;

pub use aruba::{ArubaCredentials, ArubaProvider, ARUBA_URL};
pub use free::{FreeTsaProvider, FREETSA_URL};
pub use transport::{HyperTransport, TsaTransport};
pub use verify::verify_token;

use crate::asn1::ObjectIdentifier;

/// A Timestamp Authority the layer can certify documents with.
#[async_trait]
pub trait TsaProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    fn server_url(&self) -> &str;

    /// Obtain a token for `content`, whose SHA-256 is `content_hash_hex`.
    ///
    /// `content` may be empty when only the digest is at hand.
    async fn request_timestamp(&self, content: &[u8], content_hash_hex: &str) -> TsaResult;

    /// Check `token` against the content it was issued for.
    async fn verify_timestamp(&self, token: &[u8], original_content: &[u8]) -> TsaVerifyResult;
}

/// Which provider variant to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TsaProviderKind {
    #[default]
    Free,
    Aruba,
}

impl TsaProviderKind {
    pub fn default_url(self) -> &'static str {
        match self {
            TsaProviderKind::Free => FREETSA_URL,
            TsaProviderKind::Aruba => ARUBA_URL,
        }
    }
}

impl fmt::Display for TsaProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TsaProviderKind::Free => "free",
            TsaProviderKind::Aruba => "aruba",
        })
    }
}

/// Everything needed to construct the active provider.
#[derive(Debug, Clone)]
pub struct TsaSettings {
    pub kind: TsaProviderKind,
    pub server_url: String,
    pub timeout: Duration,
    /// Ignored by the free provider.
    pub credentials: Option<ArubaCredentials>,
    /// Ignored by the free provider.
    pub policy: Option<ObjectIdentifier>,
}

/// Construct the configured provider over `transport`.
pub fn build_provider(
    settings: TsaSettings,
    transport: Arc<dyn TsaTransport>,
) -> Arc<dyn TsaProvider> {
    match settings.kind {
        TsaProviderKind::Free => Arc::new(FreeTsaProvider::new(
            settings.server_url,
            settings.timeout,
            transport,
        )),
        TsaProviderKind::Aruba => Arc::new(ArubaProvider::new(
            settings.server_url,
            settings.timeout,
            settings.credentials,
            settings.policy,
            transport,
        )),
    }
}
