//! Qualified (eIDAS) provider for production.
//!
//! Same protocol as the free provider, plus HTTP Basic authentication and an
//! optional issuer policy OID in every request.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{TrustError, TsaResult, TsaVerifyResult};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::client::{RequestOptions, TsaEndpoint};
use super::transport::TsaTransport;
use super::TsaProvider;
use crate::asn1::ObjectIdentifier;

/// Aruba qualified timestamping endpoint.
pub const ARUBA_URL: &str = "https://servizi.arubapec.it/tsa/ngrequest.php";

/// Basic-Auth credentials for the qualified TSA.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ArubaCredentials {
    username: String,
    password: String,
}

impl ArubaCredentials {
    /// `None` unless both parts are non-empty.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `Authorization` header value.
    pub fn basic_auth(&self) -> String {
        let pair = zeroize::Zeroizing::new(format!("{}:{}", self.username, self.password));
        format!("Basic {}", STANDARD.encode(pair.as_bytes()))
    }
}

impl fmt::Debug for ArubaCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArubaCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Authenticated RFC 3161 provider.
#[derive(Debug, Clone)]
pub struct ArubaProvider {
    endpoint: TsaEndpoint,
    credentials: Option<ArubaCredentials>,
    policy: Option<ObjectIdentifier>,
}

impl ArubaProvider {
    pub const NAME: &'static str = "Aruba";

    /// Missing credentials are reported per call as a configuration error,
    /// not here.
    pub fn new(
        server_url: impl Into<String>,
        timeout: Duration,
        credentials: Option<ArubaCredentials>,
        policy: Option<ObjectIdentifier>,
        transport: Arc<dyn TsaTransport>,
    ) -> Self {
        Self {
            endpoint: TsaEndpoint::new(Self::NAME, server_url, timeout, transport),
            credentials,
            policy,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

#[async_trait]
impl TsaProvider for ArubaProvider {
    fn provider_name(&self) -> &str {
        self.endpoint.provider_name()
    }

    fn server_url(&self) -> &str {
        self.endpoint.server_url()
    }

    async fn request_timestamp(&self, content: &[u8], content_hash_hex: &str) -> TsaResult {
        let Some(credentials) = self.credentials.as_ref() else {
            let error = TrustError::Configuration(
                "qualified TSA requires TSA_USERNAME and TSA_PASSWORD".into(),
            );
            return self.endpoint.fail(&error, Instant::now());
        };
        let authorization = credentials.basic_auth();
        let options = RequestOptions {
            policy: self.policy.as_ref(),
            authorization: Some(authorization.as_str()),
        };
        self.endpoint
            .request(content, content_hash_hex, options)
            .await
    }

    async fn verify_timestamp(&self, token: &[u8], original_content: &[u8]) -> TsaVerifyResult {
        self.endpoint.verify(token, original_content)
    }
}
