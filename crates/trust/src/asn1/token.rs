//! Reading the fields this layer needs out of a `TimeStampToken`.
//!
//! A token is a CMS `ContentInfo` wrapping `SignedData` whose encapsulated
//! content is the DER `TSTInfo`:
//!
//! ```text
//! ContentInfo { signedData, [0] SignedData {
//!     version, digestAlgorithms,
//!     encapContentInfo { id-ct-TSTInfo, [0] OCTET STRING TSTInfo },
//!     ... } }
//!
//! TSTInfo ::= SEQUENCE {
//!    version, policy, messageImprint, serialNumber, genTime,
//!    accuracy OPTIONAL, ordering DEFAULT FALSE, nonce OPTIONAL, ... }
//! ```
//!
//! The walk stops at `TSTInfo`; certificates and signatures are not parsed or
//! verified. If the walk fails, the imprint and signing time fall back to a
//! raw byte scan, which can be fooled by other `GeneralizedTime` values such as
//! certificate validity bounds.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::der::{self, tag, DerError, DerReader, Tlv};
use super::oid::{self, ObjectIdentifier};
use super::request::{read_message_imprint, DIGEST_LEN};
use super::response::TimeStampResp;
use super::time::{parse_generalized_time, scan_generalized_time};

/// Fields extracted from a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub message_imprint: Option<[u8; DIGEST_LEN]>,
    pub gen_time: Option<DateTime<Utc>>,
    /// Lowercase hex serial number (structural walk only).
    pub serial_number: Option<String>,
    pub policy: Option<ObjectIdentifier>,
    /// Big-endian nonce echoed by the TSA (structural walk only).
    pub nonce: Option<Vec<u8>>,
    /// `false` when the fields came from the byte-scan fallback.
    pub structural: bool,
}

impl TokenInfo {
    pub fn message_imprint_hex(&self) -> Option<String> {
        self.message_imprint.map(hex::encode)
    }
}

/// Inspect a token, or a complete response that carries one.
///
/// A response is unwrapped at most once; the token inside it must be a
/// `ContentInfo` (or something the byte scan can read), not another response.
///
/// # Errors
///
/// Fails if `bytes` is not a DER `SEQUENCE`, is a response without a granted
/// token, or nests one response inside another.
pub fn inspect_token(bytes: &[u8]) -> Result<TokenInfo, DerError> {
    let outer = expect_sequence(bytes)?;
    if !looks_like_response(outer) {
        return inspect_content_info(bytes, outer);
    }

    let resp = TimeStampResp::from_der(bytes)?;
    let token = match resp.token {
        Some(token) if resp.status.is_granted() => token,
        _ => return Err(DerError::Invalid("response without a granted token")),
    };
    let inner = expect_sequence(&token)?;
    if looks_like_response(inner) {
        return Err(DerError::Invalid("nested timestamp response"));
    }
    inspect_content_info(&token, inner)
}

fn expect_sequence(bytes: &[u8]) -> Result<Tlv<'_>, DerError> {
    let (outer, _) = der::parse_tlv(bytes)?;
    if outer.tag != tag::SEQUENCE {
        return Err(DerError::UnexpectedTag {
            expected: tag::SEQUENCE,
            found: outer.tag,
        });
    }
    Ok(outer)
}

/// A `ContentInfo` starts with an OID; a `TimeStampResp` with `PKIStatusInfo`.
fn looks_like_response(outer: Tlv<'_>) -> bool {
    DerReader::new(outer.value).peek_tag() == Some(tag::SEQUENCE)
}

fn inspect_content_info(bytes: &[u8], outer: Tlv<'_>) -> Result<TokenInfo, DerError> {
    match walk_content_info(outer) {
        Ok(info) => Ok(info),
        Err(e) => {
            debug!(error = %e, "structural TSTInfo walk failed; scanning raw token bytes");
            Ok(TokenInfo {
                message_imprint: scan_message_imprint(bytes),
                gen_time: scan_generalized_time(bytes),
                serial_number: None,
                policy: None,
                nonce: None,
                structural: false,
            })
        }
    }
}

fn walk_content_info(content_info: Tlv<'_>) -> Result<TokenInfo, DerError> {
    let mut ci = DerReader::new(content_info.value);
    let content_type = ObjectIdentifier::from_content(ci.read(tag::OID)?.value)?;
    if !content_type.is(oid::SIGNED_DATA) {
        return Err(DerError::Invalid("ContentInfo content type"));
    }
    let mut explicit = DerReader::new(ci.read(tag::CONTEXT_0)?.value);
    let mut signed_data = DerReader::new(explicit.read(tag::SEQUENCE)?.value);
    signed_data.read(tag::INTEGER)?;
    signed_data.read(tag::SET)?;

    let mut encap = DerReader::new(signed_data.read(tag::SEQUENCE)?.value);
    let econtent_type = ObjectIdentifier::from_content(encap.read(tag::OID)?.value)?;
    if !econtent_type.is(oid::TST_INFO) {
        return Err(DerError::Invalid("encapsulated content type"));
    }
    let mut econtent = DerReader::new(encap.read(tag::CONTEXT_0)?.value);
    parse_tst_info(econtent.read(tag::OCTET_STRING)?.value)
}

fn parse_tst_info(bytes: &[u8]) -> Result<TokenInfo, DerError> {
    let (tst, _) = der::parse_tlv(bytes)?;
    if tst.tag != tag::SEQUENCE {
        return Err(DerError::Invalid("TSTInfo"));
    }
    let mut r = DerReader::new(tst.value);
    r.read(tag::INTEGER)?;
    let policy = ObjectIdentifier::from_content(r.read(tag::OID)?.value)?;
    let imprint = read_message_imprint(r.read(tag::SEQUENCE)?.value)?;
    let serial = der::unsigned_magnitude(r.read(tag::INTEGER)?.value);

    let gen_time = r.read(tag::GENERALIZED_TIME)?.value;
    let gen_time = std::str::from_utf8(gen_time)
        .ok()
        .and_then(parse_generalized_time)
        .ok_or(DerError::Invalid("genTime"))?;

    r.read_optional(tag::SEQUENCE)?; // accuracy
    r.read_optional(tag::BOOLEAN)?; // ordering
    let nonce = r
        .read_optional(tag::INTEGER)?
        .map(|t| der::unsigned_magnitude(t.value).to_vec());

    Ok(TokenInfo {
        message_imprint: Some(imprint),
        gen_time: Some(gen_time),
        serial_number: Some(hex::encode(serial)),
        policy: Some(policy),
        nonce,
        structural: true,
    })
}

/// First SHA-256 `AlgorithmIdentifier` immediately followed by a 32-byte
/// `OCTET STRING`.
fn scan_message_imprint(bytes: &[u8]) -> Option<[u8; DIGEST_LEN]> {
    let mut marker = vec![tag::OID, oid::SHA256_CONTENT.len() as u8];
    marker.extend_from_slice(&oid::SHA256_CONTENT);

    bytes
        .windows(marker.len())
        .enumerate()
        .filter(|(_, w)| *w == marker.as_slice())
        .find_map(|(i, _)| {
            let mut rest = &bytes[i + marker.len()..];
            if rest.starts_with(&[tag::NULL, 0x00]) {
                rest = &rest[2..];
            }
            let digest = rest.strip_prefix(&[tag::OCTET_STRING, DIGEST_LEN as u8])?;
            digest.get(..DIGEST_LEN)?.try_into().ok()
        })
}
