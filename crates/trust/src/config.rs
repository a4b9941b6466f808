//! Configuration loading and validation for the trust layer.
//!
//! All values are read from environment variables at startup. Loading fails
//! with a descriptive error if the encryption key is missing or malformed, or
//! if any TSA setting is unusable. Missing qualified-provider credentials are
//! not fatal here; they are reported on each timestamp request instead.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::asn1::ObjectIdentifier;
use crate::key::KeyProvider;
use crate::tsa::{ArubaCredentials, TsaProviderKind, TsaSettings};

/// Configuration value that must never be printed.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Validated trust-layer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Field encryption key, 64 hex characters. **Required.**
    pub encryption_key: Secret,

    /// Active timestamp provider.
    #[serde(default)]
    pub tsa_provider: TsaProviderKind,

    /// TSA endpoint; the provider's public URL when unset.
    #[serde(default)]
    pub tsa_url: Option<String>,

    /// Per-request TSA deadline in seconds.
    #[serde(default = "default_tsa_timeout")]
    pub tsa_timeout_secs: u64,

    /// Qualified-provider Basic-Auth user.
    #[serde(default)]
    pub tsa_username: Option<String>,

    /// Qualified-provider Basic-Auth password.
    #[serde(default)]
    pub tsa_password: Option<Secret>,

    /// Dotted policy OID placed in qualified-provider requests.
    #[serde(default)]
    pub tsa_policy_oid: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint for span export; spans stay local when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_tsa_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required variable is absent or invalid.
    pub fn from_env() -> Result<Self> {
        Self::load(config::Environment::default())
    }

    fn load(source: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        self.key_provider()?;

        if self.tsa_timeout_secs == 0 {
            anyhow::bail!("TSA_TIMEOUT_SECS must be > 0");
        }
        let url = self.tsa_url();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            anyhow::bail!("TSA_URL must be an http(s) URL, got {url:?}");
        }
        if self.tsa_provider == TsaProviderKind::Aruba && !url.starts_with("https://") {
            anyhow::bail!("TSA_URL must use https:// for the qualified provider, got {url:?}");
        }
        self.policy_oid()?;
        Ok(())
    }

    /// Decode the configured encryption key.
    ///
    /// # Errors
    ///
    /// Returns an error if `ENCRYPTION_KEY` is empty, not hex, or not 32 bytes.
    pub fn key_provider(&self) -> Result<KeyProvider> {
        KeyProvider::from_hex(self.encryption_key.expose()).context("ENCRYPTION_KEY is invalid")
    }

    /// Configured TSA URL, or the selected provider's default.
    pub fn tsa_url(&self) -> &str {
        non_empty(self.tsa_url.as_deref()).unwrap_or_else(|| self.tsa_provider.default_url())
    }

    pub fn tsa_timeout(&self) -> Duration {
        Duration::from_secs(self.tsa_timeout_secs)
    }

    /// Parsed `TSA_POLICY_OID`, if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a dotted object identifier.
    pub fn policy_oid(&self) -> Result<Option<ObjectIdentifier>> {
        non_empty(self.tsa_policy_oid.as_deref())
            .map(|s| s.parse::<ObjectIdentifier>().context("TSA_POLICY_OID is invalid"))
            .transpose()
    }

    /// Qualified-provider credentials; `None` unless both parts are set.
    pub fn credentials(&self) -> Option<ArubaCredentials> {
        let username = non_empty(self.tsa_username.as_deref())?;
        let password = self.tsa_password.as_ref()?;
        ArubaCredentials::new(username, password.expose())
    }

    /// Settings for [`crate::tsa::build_provider`].
    ///
    /// # Errors
    ///
    /// Returns an error if the policy OID is invalid.
    pub fn tsa_settings(&self) -> Result<TsaSettings> {
        Ok(TsaSettings {
            kind: self.tsa_provider,
            server_url: self.tsa_url().to_owned(),
            timeout: self.tsa_timeout(),
            credentials: self.credentials(),
            policy: self.policy_oid()?,
        })
    }

    pub fn otlp_endpoint(&self) -> Option<&str> {
        non_empty(self.otel_exporter_otlp_endpoint.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
