//! Unqualified provider for development environments.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{TsaResult, TsaVerifyResult};

use super::client::{RequestOptions, TsaEndpoint};
use super::transport::TsaTransport;
use super::TsaProvider;

/// Public FreeTSA endpoint.
pub const FREETSA_URL: &str = "https://freetsa.org/tsr";

/// Anonymous RFC 3161 provider (no credentials, no policy).
#[derive(Debug, Clone)]
pub struct FreeTsaProvider {
    endpoint: TsaEndpoint,
}

impl FreeTsaProvider {
    pub const NAME: &'static str = "FreeTSA";

    pub fn new(
        server_url: impl Into<String>,
        timeout: Duration,
        transport: Arc<dyn TsaTransport>,
    ) -> Self {
        Self {
            endpoint: TsaEndpoint::new(Self::NAME, server_url, timeout, transport),
        }
    }
}

#[async_trait]
impl TsaProvider for FreeTsaProvider {
    fn provider_name(&self) -> &str {
        self.endpoint.provider_name()
    }

    fn server_url(&self) -> &str {
        self.endpoint.server_url()
    }

    async fn request_timestamp(&self, content: &[u8], content_hash_hex: &str) -> TsaResult {
        self.endpoint
            .request(content, content_hash_hex, RequestOptions::default())
            .await
    }

    async fn verify_timestamp(&self, token: &[u8], original_content: &[u8]) -> TsaVerifyResult {
        self.endpoint.verify(token, original_content)
    }
}
