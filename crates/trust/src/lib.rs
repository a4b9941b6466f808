//! Trust & compliance layer.
//!
//! Two capabilities for the surrounding application:
//! - [`crypto::FieldCipher`]: AES-256-GCM encryption of PII fields before
//!   persistence, plus [`crypto::compute_lookup_hash`] for equality search.
//! - [`tsa::TsaProvider`]: RFC 3161 timestamp tokens from an external
//!   Timestamp Authority, and offline verification of stored tokens.
//!
//! Startup sequence (see [`TrustLayer::bootstrap`]):
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise telemetry (JSON logs, optional OTLP spans).
//! 3. Decode the encryption key into a [`key::KeyProvider`]; a bad key aborts
//!    startup.
//! 4. Build the HTTPS transport and the configured TSA provider.

pub mod asn1;
pub mod config;
pub mod crypto;
pub mod key;
pub mod telemetry;
pub mod tsa;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub use crate::config::Config;
use crypto::FieldCipher;
use tsa::{HyperTransport, TsaProvider, TsaProviderKind, TsaTransport};

/// The layer's two services, wired once per process.
#[derive(Clone)]
pub struct TrustLayer {
    pub cipher: FieldCipher,
    pub timestamps: Arc<dyn TsaProvider>,
}

impl TrustLayer {
    /// Load configuration, start telemetry and build both services.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or telemetry cannot be
    /// initialised.
    pub fn from_env() -> Result<Self> {
        let cfg = Config::from_env()?;
        telemetry::init_telemetry(&cfg.log_level, cfg.otlp_endpoint())?;
        let transport = HyperTransport::new().context("failed to build TSA HTTPS client")?;
        Self::bootstrap(&cfg, Arc::new(transport))
    }

    /// Build both services from an already-loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or TSA settings are invalid.
    pub fn bootstrap(cfg: &Config, transport: Arc<dyn TsaTransport>) -> Result<Self> {
        let keys = Arc::new(cfg.key_provider()?);
        info!("field encryption key loaded");

        let settings = cfg.tsa_settings()?;
        if settings.kind == TsaProviderKind::Aruba && settings.credentials.is_none() {
            warn!(
                "qualified TSA selected without TSA_USERNAME/TSA_PASSWORD; \
                 timestamp requests will fail"
            );
        }
        info!(
            provider = %settings.kind,
            server_url = %settings.server_url,
            timeout_secs = cfg.tsa_timeout_secs,
            "timestamp provider configured"
        );

        Ok(Self {
            cipher: FieldCipher::from_provider(keys),
            timestamps: tsa::build_provider(settings, transport),
        })
    }
}

impl std::fmt::Debug for TrustLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustLayer")
            .field("cipher", &self.cipher)
            .field("provider", &self.timestamps.provider_name())
            .finish()
    }
}
