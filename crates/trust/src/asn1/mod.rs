//! Hand-built ASN.1 DER codec for RFC 3161 messages.
//!
//! Shared by both TSA provider adapters:
//! - [`request`]: encode (and decode) `TimeStampReq`.
//! - [`response`]: decode `TimeStampResp` and map `PKIStatus`.
//! - [`token`]: read imprint, signing time and serial out of a token.
//! - [`time`]: `GeneralizedTime` parsing and the raw-byte date scan.

pub mod der;
pub mod oid;
pub mod request;
pub mod response;
pub mod time;
pub mod token;

#[cfg(test)]
pub(crate) mod fixtures;

pub use der::DerError;
pub use oid::ObjectIdentifier;
pub use request::{TimeStampReq, DIGEST_LEN};
pub use response::{PkiStatus, TimeStampResp};
pub use token::{inspect_token, TokenInfo};
