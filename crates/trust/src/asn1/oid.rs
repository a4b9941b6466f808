//! ASN.1 object identifiers.

use std::fmt;
use std::str::FromStr;

use super::der::{encode_tlv, tag, DerError};

/// id-sha256 (NIST), `2.16.840.1.101.3.4.2.1`.
pub const SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
/// id-signedData (PKCS #7), `1.2.840.113549.1.7.2`.
pub const SIGNED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 2];
/// id-ct-TSTInfo (RFC 3161), `1.2.840.113549.1.9.16.1.4`.
pub const TST_INFO: &[u64] = &[1, 2, 840, 113549, 1, 9, 16, 1, 4];

/// Content octets of the SHA-256 OID, used when scanning raw bytes.
pub const SHA256_CONTENT: [u8; 9] = [0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];

/// A dotted-decimal object identifier such as `2.16.840.1.101.3.4.2.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    arcs: Vec<u64>,
}

impl ObjectIdentifier {
    /// Wrap one of the arc constants defined in this module.
    pub(crate) fn from_arcs(arcs: &'static [u64]) -> Self {
        Self {
            arcs: arcs.to_vec(),
        }
    }

    /// Returns `true` if this OID equals the given arc constant.
    pub fn is(&self, arcs: &[u64]) -> bool {
        self.arcs == arcs
    }

    pub fn arcs(&self) -> &[u64] {
        &self.arcs
    }

    /// DER content octets (without tag and length).
    pub fn to_content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_base128(self.arcs[0] * 40 + self.arcs[1], &mut out);
        for &arc in &self.arcs[2..] {
            push_base128(arc, &mut out);
        }
        out
    }

    /// Complete `OBJECT IDENTIFIER` element.
    pub fn to_der(&self) -> Vec<u8> {
        encode_tlv(tag::OID, &self.to_content())
    }

    /// Decode DER content octets.
    pub fn from_content(content: &[u8]) -> Result<Self, DerError> {
        if content.is_empty() || content.last().is_some_and(|b| b & 0x80 != 0) {
            return Err(DerError::Invalid("object identifier"));
        }
        let mut values = Vec::new();
        let mut acc: u64 = 0;
        for (i, &b) in content.iter().enumerate() {
            let starts_arc = i == 0 || content[i - 1] & 0x80 == 0;
            if starts_arc && b == 0x80 {
                return Err(DerError::Invalid("object identifier"));
            }
            if acc > (u64::MAX >> 7) {
                return Err(DerError::Invalid("object identifier"));
            }
            acc = (acc << 7) | u64::from(b & 0x7F);
            if b & 0x80 == 0 {
                values.push(acc);
                acc = 0;
            }
        }

        let first = values[0];
        let (a, b) = match first {
            0..=39 => (0, first),
            40..=79 => (1, first - 40),
            _ => (2, first - 80),
        };
        let mut arcs = vec![a, b];
        arcs.extend_from_slice(&values[1..]);
        Ok(Self { arcs })
    }
}

fn push_base128(mut value: u64, out: &mut Vec<u8>) {
    let mut buf = [0u8; 10];
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = buf.len() - 1;
    for (j, b) in buf.iter_mut().enumerate().skip(i) {
        if j != last {
            *b |= 0x80;
        }
    }
    out.extend_from_slice(&buf[i..]);
}

/// Error returned when a dotted OID string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object identifier: {0:?}")]
pub struct ParseOidError(pub String);

impl FromStr for ObjectIdentifier {
    type Err = ParseOidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseOidError(s.to_owned());
        let arcs = s
            .trim()
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| err()))
            .collect::<Result<Vec<_>, _>>()?;
        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
            return Err(err());
        }
        if arcs[1] > u64::MAX - 80 {
            return Err(err());
        }
        Ok(Self { arcs })
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}
