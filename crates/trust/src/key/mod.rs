//! Key Provider: loads, validates, and holds the process-wide field key.
//!
//! # Lifecycle
//!
//! 1. At startup, [`KeyProvider::from_hex`] decodes the configured
//!    64-hex-character key. A missing or malformed key is fatal.
//! 2. The provider is wrapped in an `Arc` and handed to every
//!    [`FieldCipher`](crate::crypto::FieldCipher). There is no global
//!    registry and no "not yet initialised" state.
//!
//! # Security invariants
//!
//! - The key is **never** written to disk, logged, or included in traces.
//! - Key bytes are zeroed when the provider is dropped.

pub mod provider;

pub use provider::{EncryptionKey, KeyError, KeyProvider};
