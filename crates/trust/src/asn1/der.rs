//! Minimal DER encoder and reader.
//!
//! Covers exactly the universal types RFC 3161 messages use. Only the
//! low-tag-number form is supported; lengths may use the short form or the
//! long form with up to four length octets. Indefinite lengths are rejected.

use thiserror::Error;

/// Tag octets used by RFC 3161 structures.
pub mod tag {
    pub const BOOLEAN: u8 = 0x01;
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const UTF8_STRING: u8 = 0x0C;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
    /// `[0]` constructed, context-specific.
    pub const CONTEXT_0: u8 = 0xA0;
    /// `[1]` constructed, context-specific.
    pub const CONTEXT_1: u8 = 0xA1;
}

/// Errors produced while reading DER.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerError {
    /// The input ended inside a tag, length, or value.
    #[error("unexpected end of DER input")]
    Truncated,

    /// A different element was found where a specific one was required.
    #[error("expected tag 0x{expected:02x}, found 0x{found:02x}")]
    UnexpectedTag {
        /// Tag the structure requires.
        expected: u8,
        /// Tag actually present.
        found: u8,
    },

    /// `0x80` length octet; BER only.
    #[error("indefinite length is not allowed in DER")]
    IndefiniteLength,

    /// More than four length octets.
    #[error("DER length field too large")]
    LengthOverflow,

    /// Multi-octet tag numbers are not used by RFC 3161.
    #[error("high tag number form is not supported")]
    HighTagNumber,

    /// A value was structurally valid but semantically malformed.
    #[error("invalid {0}")]
    Invalid(&'static str),

    /// Bytes were left over after a complete structure.
    #[error("trailing data after {0}")]
    TrailingData(&'static str),
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let significant = &bytes[first..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Encode a single tag-length-value element.
pub fn encode_tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 6);
    out.push(tag);
    encode_length(value.len(), &mut out);
    out.extend_from_slice(value);
    out
}

/// `SEQUENCE` whose content is the concatenation of already-encoded `parts`.
pub fn sequence(parts: &[&[u8]]) -> Vec<u8> {
    encode_tlv(tag::SEQUENCE, &parts.concat())
}

/// `SET` whose content is the concatenation of already-encoded `parts`.
pub fn set(parts: &[&[u8]]) -> Vec<u8> {
    encode_tlv(tag::SET, &parts.concat())
}

/// Non-negative `INTEGER` from big-endian magnitude bytes.
///
/// Leading zero octets are stripped and a `0x00` is prepended when the high
/// bit is set, so the result is the minimal two's-complement encoding.
pub fn integer_unsigned(magnitude: &[u8]) -> Vec<u8> {
    let first = magnitude.iter().position(|&b| b != 0);
    let trimmed = match first {
        Some(i) => &magnitude[i..],
        None => &[0u8][..],
    };
    if trimmed[0] & 0x80 != 0 {
        let mut padded = Vec::with_capacity(trimmed.len() + 1);
        padded.push(0);
        padded.extend_from_slice(trimmed);
        encode_tlv(tag::INTEGER, &padded)
    } else {
        encode_tlv(tag::INTEGER, trimmed)
    }
}

/// Small non-negative `INTEGER`.
pub fn integer_u64(value: u64) -> Vec<u8> {
    integer_unsigned(&value.to_be_bytes())
}

pub fn boolean(value: bool) -> Vec<u8> {
    encode_tlv(tag::BOOLEAN, &[if value { 0xFF } else { 0x00 }])
}

pub fn null() -> Vec<u8> {
    encode_tlv(tag::NULL, &[])
}

pub fn octet_string(content: &[u8]) -> Vec<u8> {
    encode_tlv(tag::OCTET_STRING, content)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// One decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    /// Content octets.
    pub value: &'a [u8],
    /// Complete encoding including tag and length.
    pub raw: &'a [u8],
}

/// Parse the element at the start of `data`, returning it and the rest.
pub fn parse_tlv(data: &[u8]) -> Result<(Tlv<'_>, &[u8]), DerError> {
    let (&tag, rest) = data.split_first().ok_or(DerError::Truncated)?;
    if tag & 0x1F == 0x1F {
        return Err(DerError::HighTagNumber);
    }
    let (&first, rest) = rest.split_first().ok_or(DerError::Truncated)?;

    let (len, rest) = match first {
        0x00..=0x7F => (first as usize, rest),
        0x80 => return Err(DerError::IndefiniteLength),
        _ => {
            let count = (first & 0x7F) as usize;
            if count > 4 {
                return Err(DerError::LengthOverflow);
            }
            if rest.len() < count {
                return Err(DerError::Truncated);
            }
            let len = rest[..count]
                .iter()
                .fold(0usize, |acc, &b| (acc << 8) | b as usize);
            (len, &rest[count..])
        }
    };

    if rest.len() < len {
        return Err(DerError::Truncated);
    }
    let header_len = data.len() - rest.len();
    let tlv = Tlv {
        tag,
        value: &rest[..len],
        raw: &data[..header_len + len],
    };
    Ok((tlv, &rest[len..]))
}

/// Sequential reader over the content of a constructed element.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    data: &'a [u8],
}

impl<'a> DerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// Read the next element whatever its tag.
    pub fn read_any(&mut self) -> Result<Tlv<'a>, DerError> {
        let (tlv, rest) = parse_tlv(self.data)?;
        self.data = rest;
        Ok(tlv)
    }

    /// Read the next element, which must carry `expected`.
    pub fn read(&mut self, expected: u8) -> Result<Tlv<'a>, DerError> {
        match self.peek_tag() {
            None => Err(DerError::Truncated),
            Some(found) if found != expected => Err(DerError::UnexpectedTag { expected, found }),
            Some(_) => self.read_any(),
        }
    }

    /// Read the next element only if it carries `expected`.
    pub fn read_optional(&mut self, expected: u8) -> Result<Option<Tlv<'a>>, DerError> {
        if self.peek_tag() == Some(expected) {
            self.read_any().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Fail unless every byte has been consumed.
    pub fn finish(&self, what: &'static str) -> Result<(), DerError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(DerError::TrailingData(what))
        }
    }
}

/// Decode an `INTEGER` value that must fit in an `i64`.
pub fn decode_i64(value: &[u8]) -> Result<i64, DerError> {
    if value.is_empty() || value.len() > 8 {
        return Err(DerError::Invalid("integer"));
    }
    let negative = value[0] & 0x80 != 0;
    let init: i64 = if negative { -1 } else { 0 };
    Ok(value.iter().fold(init, |acc, &b| (acc << 8) | b as i64))
}

/// Decode a `BOOLEAN` value.
pub fn decode_bool(value: &[u8]) -> Result<bool, DerError> {
    match value {
        [0x00] => Ok(false),
        [0xFF] => Ok(true),
        _ => Err(DerError::Invalid("boolean")),
    }
}

/// Big-endian magnitude of a non-negative `INTEGER` without its sign octet.
pub fn unsigned_magnitude(value: &[u8]) -> &[u8] {
    match value {
        [0x00, rest @ ..] if !rest.is_empty() => rest,
        _ => value,
    }
}
