//! Shared error taxonomy and result types for the trust & compliance layer.

pub mod error;
pub mod protocol;

pub use error::{ErrorKind, TrustError};
pub use protocol::{GrantedToken, TsaResult, TsaVerifyResult};
