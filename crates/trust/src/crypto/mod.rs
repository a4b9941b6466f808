//! Field-level encryption primitives.
//!
//! This module is intentionally free of HTTP and configuration dependencies.
//! It provides the AEAD codec applied by storage adapters immediately before
//! a write and immediately after a read, plus the lookup hash that makes
//! encrypted columns searchable by equality.
//!
//! # Ciphertext format
//!
//! ```text
//! base64(iv[12] ‖ tag[16] ‖ ciphertext[N])
//! ```
//!
//! Values that do not decode to this layout, or do not authenticate under the
//! current key, are treated as legacy plaintext and returned unchanged.

pub mod cipher;
pub mod lookup;

pub use cipher::{CipherError, EncryptedValue, FieldCipher, KEY_LEN};
pub use lookup::compute_lookup_hash;
