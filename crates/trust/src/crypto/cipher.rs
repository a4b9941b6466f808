//! AES-256-GCM encryption and decryption of individual string fields.
//!
//! **IV policy:** every call draws a fresh 96-bit IV from the OS CSPRNG. The IV
//! is never derived from content or a counter, so two encryptions of the same
//! plaintext never produce the same output.
//!
//! **Equality:** because ciphertext is randomized, two stored values must never
//! be compared byte-for-byte to decide whether they hold the same data. Compare
//! decrypted plaintext with [`FieldCipher::plaintext_eq`] or compare lookup
//! hashes from [`compute_lookup_hash`](super::compute_lookup_hash).

use std::sync::Arc;

use aes_gcm::{
    aead::{rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::TrustError;
use thiserror::Error;
use tracing::debug;

use crate::key::{KeyError, KeyProvider};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM IV (12 bytes = 96 bits).
pub const IV_LEN: usize = 12;

/// Byte length of an AES-GCM authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Shortest decoded value that can hold an IV, a tag and one ciphertext byte.
pub const MIN_ENCRYPTED_LEN: usize = IV_LEN + TAG_LEN + 1;

/// A parsed, encrypted field value.
///
/// The string representation is `base64(iv ‖ tag ‖ ciphertext)`. This type
/// deliberately does not implement `PartialEq`: see the module docs.
#[derive(Debug, Clone)]
pub struct EncryptedValue {
    /// Raw IV bytes.
    pub iv: [u8; IV_LEN],
    /// Raw authentication tag bytes.
    pub tag: [u8; TAG_LEN],
    /// Raw ciphertext bytes (same length as the plaintext).
    pub ciphertext: Vec<u8>,
}

impl EncryptedValue {
    /// Encode this value to its canonical string representation.
    pub fn to_string_repr(&self) -> String {
        let mut raw = Vec::with_capacity(IV_LEN + TAG_LEN + self.ciphertext.len());
        raw.extend_from_slice(&self.iv);
        raw.extend_from_slice(&self.tag);
        raw.extend_from_slice(&self.ciphertext);
        STANDARD.encode(raw)
    }

    /// Split a stored string into IV, tag and ciphertext.
    ///
    /// Returns `None` when the string is not Base64 or is too short to be one
    /// of our values; callers treat such strings as legacy plaintext.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = STANDARD.decode(s).ok()?;
        if raw.len() < MIN_ENCRYPTED_LEN {
            return None;
        }
        let (iv, rest) = raw.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);
        Some(Self {
            iv: iv.try_into().ok()?,
            tag: tag.try_into().ok()?,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Errors produced by the cipher layer.
///
/// Malformed *input data* is never an error; only a structurally invalid key
/// (or an AEAD failure that cannot happen with a valid key) is.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// AES-GCM encryption failed.
    #[error("aead operation failed")]
    AeadFailure,
}

impl From<KeyError> for CipherError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::InvalidLength(n) => CipherError::InvalidKeyLength(n),
            _ => CipherError::InvalidKeyLength(0),
        }
    }
}

impl From<CipherError> for TrustError {
    fn from(e: CipherError) -> Self {
        match e {
            CipherError::InvalidKeyLength(n) => TrustError::InvalidKeyLength(n),
            CipherError::AeadFailure => TrustError::Configuration(e.to_string()),
        }
    }
}

/// Encrypt a plaintext string field using AES-256-GCM.
///
/// An empty `plaintext` is returned unchanged: absence of data is not
/// encrypted.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
pub fn encrypt_field(plaintext: &str, key: &[u8]) -> Result<String, CipherError> {
    let cipher = build_cipher(key)?;
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    seal(&cipher, plaintext).map(|v| v.to_string_repr())
}

/// Decrypt a stored field value.
///
/// Values that are empty, not Base64, too short, fail authentication, or do
/// not decrypt to UTF-8 are returned unchanged (legacy plaintext).
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
pub fn decrypt_field(value: &str, key: &[u8]) -> Result<String, CipherError> {
    let cipher = build_cipher(key)?;
    Ok(open_or_passthrough(&cipher, value))
}

fn seal(cipher: &Aes256Gcm, plaintext: &str) -> Result<EncryptedValue, CipherError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CipherError::AeadFailure)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(EncryptedValue {
        iv,
        tag: tag_bytes,
        ciphertext: buffer,
    })
}

/// Authenticate and decrypt `value`, or `None` if it is not one of ours.
fn open(cipher: &Aes256Gcm, value: &str) -> Option<String> {
    let Some(parsed) = EncryptedValue::parse(value) else {
        debug!("stored value is not in ciphertext layout; treating as plaintext");
        return None;
    };

    let mut buffer = parsed.ciphertext;
    if cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&parsed.iv),
            b"",
            &mut buffer,
            Tag::from_slice(&parsed.tag),
        )
        .is_err()
    {
        debug!("authentication tag mismatch; treating stored value as plaintext");
        return None;
    }

    match String::from_utf8(buffer) {
        Ok(s) => Some(s),
        Err(_) => {
            debug!("decrypted bytes are not UTF-8; treating stored value as plaintext");
            None
        }
    }
}

fn open_or_passthrough(cipher: &Aes256Gcm, value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    open(cipher, value).unwrap_or_else(|| value.to_owned())
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength(key.len()));
    }
    Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))
}

/// Codec bound to the process-wide key, handed to storage adapters.
///
/// Cheap to clone; clones share the same key.
#[derive(Clone, Debug)]
pub struct FieldCipher {
    keys: Arc<KeyProvider>,
}

impl FieldCipher {
    /// Build a codec over an already-validated key.
    pub fn from_provider(keys: Arc<KeyProvider>) -> Self {
        Self { keys }
    }

    /// Build a codec from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        Ok(Self::from_provider(Arc::new(KeyProvider::from_bytes(key)?)))
    }

    fn cipher(&self) -> Result<Aes256Gcm, CipherError> {
        build_cipher(self.keys.key().as_bytes())
    }

    /// Encrypt `plaintext`; empty input passes through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::AeadFailure`] only on an internal AEAD error.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        seal(&self.cipher()?, plaintext).map(|v| v.to_string_repr())
    }

    /// Decrypt a stored value, falling back to returning it unchanged.
    pub fn decrypt(&self, value: &str) -> String {
        match self.cipher() {
            Ok(cipher) => open_or_passthrough(&cipher, value),
            // Unreachable: the provider only holds KEY_LEN-byte keys.
            Err(_) => value.to_owned(),
        }
    }

    /// [`encrypt`](Self::encrypt) for nullable columns; `None` stays `None`.
    ///
    /// # Errors
    ///
    /// See [`encrypt`](Self::encrypt).
    pub fn encrypt_opt(&self, plaintext: Option<&str>) -> Result<Option<String>, CipherError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    /// [`decrypt`](Self::decrypt) for nullable columns; `None` stays `None`.
    pub fn decrypt_opt(&self, value: Option<&str>) -> Option<String> {
        value.map(|v| self.decrypt(v))
    }

    /// Returns `true` if `value` is a ciphertext that authenticates under
    /// this key. Useful for migrating legacy plaintext rows.
    pub fn is_encrypted(&self, value: &str) -> bool {
        match self.cipher() {
            Ok(cipher) => open(&cipher, value).is_some(),
            Err(_) => false,
        }
    }

    /// Semantic equality of two stored values.
    ///
    /// Either side may be ciphertext or legacy plaintext. This is the only
    /// supported way to compare stored values for change tracking.
    pub fn plaintext_eq(&self, a: &str, b: &str) -> bool {
        self.decrypt(a) == self.decrypt(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn cipher() -> FieldCipher {
        FieldCipher::new(&random_key()).unwrap()
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let c = cipher();
        for plaintext in ["a", "123-45-6789", "Zoë Müller", "driver@fleet.example", "🚚"] {
            let encrypted = c.encrypt(plaintext).unwrap();
            assert_ne!(encrypted, plaintext);
            assert_eq!(c.decrypt(&encrypted), plaintext);
        }
    }

    #[test]
    fn encryption_is_randomized() {
        let c = cipher();
        let a = c.encrypt("secret").unwrap();
        let b = c.encrypt("secret").unwrap();
        assert_ne!(a, b);
        assert_eq!(c.decrypt(&a), "secret");
        assert_eq!(c.decrypt(&b), "secret");
        assert!(c.plaintext_eq(&a, &b));
    }

    #[test]
    fn wire_layout_is_iv_tag_ciphertext() {
        let c = cipher();
        let encrypted = c.encrypt("hello").unwrap();
        let raw = STANDARD.decode(&encrypted).unwrap();
        assert_eq!(raw.len(), IV_LEN + TAG_LEN + "hello".len());
        let parsed = EncryptedValue::parse(&encrypted).unwrap();
        assert_eq!(&raw[..IV_LEN], &parsed.iv);
        assert_eq!(&raw[IV_LEN..IV_LEN + TAG_LEN], &parsed.tag);
        assert_eq!(parsed.to_string_repr(), encrypted);
    }

    #[test]
    fn legacy_plaintext_passes_through() {
        let c = cipher();
        assert_eq!(c.decrypt("plain-unencrypted-value"), "plain-unencrypted-value");
        // Valid Base64 but shorter than IV + tag + 1.
        assert_eq!(c.decrypt("QUJDRA=="), "QUJDRA==");
        assert!(!c.is_encrypted("plain-unencrypted-value"));
    }

    #[test]
    fn empty_and_absent_are_identity() {
        let c = cipher();
        assert_eq!(c.encrypt("").unwrap(), "");
        assert_eq!(c.decrypt(""), "");
        assert_eq!(c.encrypt_opt(None).unwrap(), None);
        assert_eq!(c.decrypt_opt(None), None);
        assert_eq!(c.encrypt_opt(Some("")).unwrap().as_deref(), Some(""));
        assert_eq!(c.decrypt_opt(Some("")).as_deref(), Some(""));
    }

    #[test]
    fn wrong_key_falls_back_to_input() {
        let c1 = cipher();
        let c2 = cipher();
        let encrypted = c1.encrypt("secret").unwrap();
        assert_eq!(c2.decrypt(&encrypted), encrypted);
        assert!(c1.is_encrypted(&encrypted));
        assert!(!c2.is_encrypted(&encrypted));
    }

    #[test]
    fn tampered_ciphertext_falls_back_to_input() {
        let c = cipher();
        let encrypted = c.encrypt("tamper me").unwrap();
        let mut parsed = EncryptedValue::parse(&encrypted).unwrap();
        // Flip a byte in the ciphertext to simulate tampering.
        parsed.ciphertext[0] ^= 0xFF;
        let tampered = parsed.to_string_repr();
        assert_eq!(c.decrypt(&tampered), tampered);
    }

    #[test]
    fn invalid_key_length_rejected() {
        assert!(matches!(
            FieldCipher::new(&[0u8; 31]),
            Err(CipherError::InvalidKeyLength(31))
        ));
        assert!(matches!(
            FieldCipher::new(&[0u8; 33]),
            Err(CipherError::InvalidKeyLength(33))
        ));
        assert!(matches!(
            encrypt_field("x", &[0u8; 16]),
            Err(CipherError::InvalidKeyLength(16))
        ));
        assert!(decrypt_field("x", &[0u8; 31]).is_err());
    }

    #[test]
    fn free_functions_round_trip() {
        let key = random_key();
        let encrypted = encrypt_field("VIN 1HGCM82633A004352", &key).unwrap();
        assert_eq!(
            decrypt_field(&encrypted, &key).unwrap(),
            "VIN 1HGCM82633A004352"
        );
        assert_eq!(encrypt_field("", &key).unwrap(), "");
    }

    #[test]
    fn plaintext_eq_mixes_legacy_and_encrypted() {
        let c = cipher();
        let encrypted = c.encrypt("alice").unwrap();
        assert!(c.plaintext_eq(&encrypted, "alice"));
        assert!(!c.plaintext_eq(&encrypted, "bob"));
    }
}
