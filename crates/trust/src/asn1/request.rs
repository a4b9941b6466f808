//! RFC 3161 `TimeStampReq` encoding and decoding.
//!
//! ```text
//! TimeStampReq ::= SEQUENCE {
//!    version         INTEGER { v1(1) },
//!    messageImprint  MessageImprint,
//!    reqPolicy       TSAPolicyId OPTIONAL,
//!    nonce           INTEGER OPTIONAL,
//!    certReq         BOOLEAN DEFAULT FALSE,
//!    extensions      [0] IMPLICIT Extensions OPTIONAL }
//!
//! MessageImprint ::= SEQUENCE {
//!    hashAlgorithm   AlgorithmIdentifier,
//!    hashedMessage   OCTET STRING }
//! ```

use aes_gcm::aead::{rand_core::RngCore, OsRng};

use super::der::{self, tag, DerError, DerReader};
use super::oid::{self, ObjectIdentifier};

/// Length of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

/// Length of the random request nonce.
pub const NONCE_LEN: usize = 8;

/// A single-use timestamp request over a SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampReq {
    pub hashed_message: [u8; DIGEST_LEN],
    pub policy: Option<ObjectIdentifier>,
    /// Big-endian unsigned nonce.
    pub nonce: [u8; NONCE_LEN],
    pub cert_req: bool,
}

impl TimeStampReq {
    /// Build a request with a fresh random nonce and `certReq = true`.
    pub fn new(hashed_message: [u8; DIGEST_LEN], policy: Option<ObjectIdentifier>) -> Self {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        Self {
            hashed_message,
            policy,
            nonce,
            cert_req: true,
        }
    }

    /// DER encoding of the request.
    pub fn to_der(&self) -> Vec<u8> {
        let imprint = message_imprint(&self.hashed_message);
        let policy = self.policy.as_ref().map(ObjectIdentifier::to_der);

        let mut parts: Vec<Vec<u8>> = vec![der::integer_u64(1), imprint];
        parts.extend(policy);
        parts.push(der::integer_unsigned(&self.nonce));
        if self.cert_req {
            parts.push(der::boolean(true));
        }

        let refs: Vec<&[u8]> = parts.iter().map(Vec::as_slice).collect();
        der::sequence(&refs)
    }

    /// Decode a DER request. Only SHA-256 imprints are accepted.
    pub fn from_der(bytes: &[u8]) -> Result<Self, DerError> {
        let (outer, rest) = der::parse_tlv(bytes)?;
        if outer.tag != tag::SEQUENCE {
            return Err(DerError::UnexpectedTag {
                expected: tag::SEQUENCE,
                found: outer.tag,
            });
        }
        if !rest.is_empty() {
            return Err(DerError::TrailingData("TimeStampReq"));
        }

        let mut r = DerReader::new(outer.value);
        if der::decode_i64(r.read(tag::INTEGER)?.value)? != 1 {
            return Err(DerError::Invalid("TimeStampReq version"));
        }
        let hashed_message = read_message_imprint(r.read(tag::SEQUENCE)?.value)?;

        let policy = r
            .read_optional(tag::OID)?
            .map(|t| ObjectIdentifier::from_content(t.value))
            .transpose()?;

        let nonce = match r.read_optional(tag::INTEGER)? {
            Some(t) => {
                let magnitude = der::unsigned_magnitude(t.value);
                if magnitude.len() > NONCE_LEN {
                    return Err(DerError::Invalid("nonce"));
                }
                let mut nonce = [0u8; NONCE_LEN];
                nonce[NONCE_LEN - magnitude.len()..].copy_from_slice(magnitude);
                nonce
            }
            None => [0u8; NONCE_LEN],
        };

        let cert_req = match r.read_optional(tag::BOOLEAN)? {
            Some(t) => der::decode_bool(t.value)?,
            None => false,
        };
        // Extensions are not used by this layer.
        r.read_optional(tag::CONTEXT_0)?;
        r.finish("TimeStampReq")?;

        Ok(Self {
            hashed_message,
            policy,
            nonce,
            cert_req,
        })
    }
}

/// `MessageImprint` over a SHA-256 digest.
pub fn message_imprint(digest: &[u8; DIGEST_LEN]) -> Vec<u8> {
    let sha256 = ObjectIdentifier::from_arcs(oid::SHA256).to_der();
    let algorithm = der::sequence(&[&sha256, &der::null()]);
    der::sequence(&[&algorithm, &der::octet_string(digest)])
}

/// Decode the content of a `MessageImprint`, requiring SHA-256.
pub fn read_message_imprint(content: &[u8]) -> Result<[u8; DIGEST_LEN], DerError> {
    let mut r = DerReader::new(content);
    let mut alg = DerReader::new(r.read(tag::SEQUENCE)?.value);
    let alg_oid = ObjectIdentifier::from_content(alg.read(tag::OID)?.value)?;
    if !alg_oid.is(oid::SHA256) {
        return Err(DerError::Invalid("hash algorithm (only SHA-256 is supported)"));
    }
    // Parameters are NULL or absent.
    alg.read_optional(tag::NULL)?;
    alg.finish("AlgorithmIdentifier")?;

    let digest = r.read(tag::OCTET_STRING)?.value;
    r.finish("MessageImprint")?;
    digest
        .try_into()
        .map_err(|_| DerError::Invalid("SHA-256 digest length"))
}
