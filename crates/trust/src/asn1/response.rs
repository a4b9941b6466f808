//! RFC 3161 `TimeStampResp` decoding.
//!
//! ```text
//! TimeStampResp ::= SEQUENCE {
//!    status          PKIStatusInfo,
//!    timeStampToken  TimeStampToken OPTIONAL }
//!
//! PKIStatusInfo ::= SEQUENCE {
//!    status        PKIStatus,
//!    statusString  PKIFreeText OPTIONAL,
//!    failInfo      PKIFailureInfo OPTIONAL }
//! ```
//!
//! The token itself is returned as raw bytes; see [`super::token`] for the
//! fields this layer reads out of it.

use std::fmt;

use super::der::{self, tag, DerError, DerReader};

/// `PKIStatus` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkiStatus {
    Granted,
    GrantedWithMods,
    Rejection,
    Waiting,
    RevocationWarning,
    RevocationNotification,
    Unknown(i64),
}

impl PkiStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => PkiStatus::Granted,
            1 => PkiStatus::GrantedWithMods,
            2 => PkiStatus::Rejection,
            3 => PkiStatus::Waiting,
            4 => PkiStatus::RevocationWarning,
            5 => PkiStatus::RevocationNotification,
            other => PkiStatus::Unknown(other),
        }
    }

    /// `granted` and `grantedWithMods` both carry a usable token.
    pub fn is_granted(&self) -> bool {
        matches!(self, PkiStatus::Granted | PkiStatus::GrantedWithMods)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PkiStatus::Granted => "granted",
            PkiStatus::GrantedWithMods => "grantedWithMods",
            PkiStatus::Rejection => "rejection",
            PkiStatus::Waiting => "waiting",
            PkiStatus::RevocationWarning => "revocationWarning",
            PkiStatus::RevocationNotification => "revocationNotification",
            PkiStatus::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for PkiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PkiStatus::Unknown(code) => write!(f, "unknown ({code})"),
            other => f.write_str(other.name()),
        }
    }
}

/// `PKIFailureInfo` bit names defined by RFC 3161, indexed by bit number.
const FAILURE_BITS: &[(usize, &str)] = &[
    (0, "badAlg"),
    (2, "badRequest"),
    (5, "badDataFormat"),
    (14, "timeNotAvailable"),
    (15, "unacceptedPolicy"),
    (16, "unacceptedExtension"),
    (17, "addInfoNotAvailable"),
    (25, "systemFailure"),
];

/// A decoded TSA response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampResp {
    pub status: PkiStatus,
    /// `PKIFreeText` entries, in order.
    pub status_text: Vec<String>,
    /// Names of the `PKIFailureInfo` bits that were set.
    pub failure_info: Vec<&'static str>,
    /// Raw `TimeStampToken` bytes, if the TSA sent one.
    pub token: Option<Vec<u8>>,
}

impl TimeStampResp {
    /// Decode a DER response body.
    ///
    /// A token is taken from the bytes following `PKIStatusInfo` inside the
    /// outer `SEQUENCE`, or, for servers that append it, from the bytes
    /// following the outer `SEQUENCE`.
    pub fn from_der(bytes: &[u8]) -> Result<Self, DerError> {
        let (outer, trailing) = der::parse_tlv(bytes)?;
        if outer.tag != tag::SEQUENCE {
            return Err(DerError::UnexpectedTag {
                expected: tag::SEQUENCE,
                found: outer.tag,
            });
        }

        let mut r = DerReader::new(outer.value);
        let mut info = DerReader::new(r.read(tag::SEQUENCE)?.value);
        let status = PkiStatus::from_code(der::decode_i64(info.read(tag::INTEGER)?.value)?);

        let status_text = match info.read_optional(tag::SEQUENCE)? {
            Some(t) => read_free_text(t.value)?,
            None => Vec::new(),
        };
        let failure_info = match info.read_optional(tag::BIT_STRING)? {
            Some(t) => read_failure_info(t.value)?,
            None => Vec::new(),
        };
        info.finish("PKIStatusInfo")?;

        let token = if !r.is_empty() {
            Some(r.remaining().to_vec())
        } else if !trailing.is_empty() {
            Some(trailing.to_vec())
        } else {
            None
        };

        Ok(Self {
            status,
            status_text,
            failure_info,
            token,
        })
    }

    /// Human-readable description of a non-granted response, e.g.
    /// `"rejection: unsupported policy [unacceptedPolicy]"`.
    pub fn failure_message(&self) -> String {
        let mut msg = self.status.to_string();
        if !self.status_text.is_empty() {
            msg.push_str(": ");
            msg.push_str(&self.status_text.join("; "));
        }
        if !self.failure_info.is_empty() {
            msg.push_str(&format!(" [{}]", self.failure_info.join(", ")));
        }
        msg
    }
}

fn read_free_text(content: &[u8]) -> Result<Vec<String>, DerError> {
    let mut r = DerReader::new(content);
    let mut out = Vec::new();
    while !r.is_empty() {
        let t = r.read(tag::UTF8_STRING)?;
        let text = std::str::from_utf8(t.value).map_err(|_| DerError::Invalid("PKIFreeText"))?;
        out.push(text.to_owned());
    }
    Ok(out)
}

fn read_failure_info(content: &[u8]) -> Result<Vec<&'static str>, DerError> {
    let (&unused, bits) = content
        .split_first()
        .ok_or(DerError::Invalid("PKIFailureInfo"))?;
    if unused > 7 {
        return Err(DerError::Invalid("PKIFailureInfo"));
    }
    let is_set = |bit: usize| {
        bits.get(bit / 8)
            .is_some_and(|byte| byte & (0x80 >> (bit % 8)) != 0)
    };
    Ok(FAILURE_BITS
        .iter()
        .filter(|(bit, _)| is_set(*bit))
        .map(|(_, name)| *name)
        .collect())
}
