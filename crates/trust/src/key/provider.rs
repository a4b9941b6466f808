//! [`KeyProvider`]: validated, immutable holder of the field encryption key.

use common::TrustError;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::KEY_LEN;

/// Length of the hex-encoded key accepted from configuration.
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;

/// Errors produced while loading the encryption key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// No key was configured.
    #[error("encryption key is not configured")]
    Missing,

    /// The configured key is not valid hexadecimal.
    #[error("encryption key is not valid hex")]
    InvalidHex,

    /// The key material has an unexpected length.
    #[error("encryption key has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

impl From<KeyError> for TrustError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::InvalidLength(n) => TrustError::InvalidKeyLength(n),
            other => TrustError::Configuration(other.to_string()),
        }
    }
}

/// Fixed-size buffer holding exactly [`KEY_LEN`] bytes of key material.
///
/// Zeroed on drop. `Debug` never prints the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Copy `bytes` into a new key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if `bytes` is not [`KEY_LEN`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let buf: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidLength(bytes.len()))?;
        Ok(Self(buf))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey([REDACTED])")
    }
}

/// Process-wide source of the field encryption key.
///
/// Constructed once at startup and shared by reference; immutable afterwards.
#[derive(Debug)]
pub struct KeyProvider {
    key: EncryptionKey,
}

impl KeyProvider {
    /// Decode a 64-hex-character key.
    ///
    /// Surrounding whitespace is ignored; upper- and lowercase hex are both
    /// accepted.
    ///
    /// # Errors
    ///
    /// - [`KeyError::Missing`] if `encoded` is empty.
    /// - [`KeyError::InvalidLength`] if it does not decode to [`KEY_LEN`] bytes.
    /// - [`KeyError::InvalidHex`] if it contains non-hex characters.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(KeyError::Missing);
        }
        if encoded.len() != KEY_HEX_LEN {
            return Err(KeyError::InvalidLength(encoded.len() / 2));
        }
        let mut buf = [0u8; KEY_LEN];
        hex::decode_to_slice(encoded, &mut buf).map_err(|_| KeyError::InvalidHex)?;
        let key = EncryptionKey(buf);
        buf.zeroize();
        Ok(Self { key })
    }

    /// Wrap already-decoded key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if `bytes` is not [`KEY_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self {
            key: EncryptionKey::from_slice(bytes)?,
        })
    }

    pub(crate) fn key(&self) -> &EncryptionKey {
        &self.key
    }
}
