//! DER fixtures for tests, built with this crate's own encoder.

use super::der::{self, encode_tlv, tag};
use super::oid::{self, ObjectIdentifier};
use super::request::{message_imprint, DIGEST_LEN};

/// Policy OID carried by fixture tokens.
pub const TEST_POLICY: &str = "1.3.6.1.4.1.4146.2.2";

fn oid_der(dotted: &str) -> Vec<u8> {
    dotted
        .parse::<ObjectIdentifier>()
        .expect("fixture OID is valid")
        .to_der()
}

fn tst_info(
    imprint: &[u8; DIGEST_LEN],
    serial: &[u8],
    gen_time: &str,
    nonce: &[u8],
) -> Vec<u8> {
    der::sequence(&[
        &der::integer_u64(1),
        &oid_der(TEST_POLICY),
        &message_imprint(imprint),
        &der::integer_unsigned(serial),
        &encode_tlv(tag::GENERALIZED_TIME, gen_time.as_bytes()),
        &der::integer_unsigned(nonce),
    ])
}

fn wrap_in_content_info(tst_info: &[u8]) -> Vec<u8> {
    let sha256 = ObjectIdentifier::from_arcs(oid::SHA256).to_der();
    let digest_algorithms = der::set(&[&der::sequence(&[&sha256, &der::null()])]);
    let encap = der::sequence(&[
        &ObjectIdentifier::from_arcs(oid::TST_INFO).to_der(),
        &encode_tlv(tag::CONTEXT_0, &der::octet_string(tst_info)),
    ]);
    // Unsigned placeholder for SignerInfos; nothing here verifies signatures.
    let signer_infos = der::set(&[]);
    let signed_data = der::sequence(&[
        &der::integer_u64(3),
        &digest_algorithms,
        &encap,
        &signer_infos,
    ]);
    der::sequence(&[
        &ObjectIdentifier::from_arcs(oid::SIGNED_DATA).to_der(),
        &encode_tlv(tag::CONTEXT_0, &signed_data),
    ])
}

/// Well-formed token over `imprint`, signed at `gen_time`.
pub fn signed_token(imprint: &[u8; DIGEST_LEN], gen_time: &str) -> Vec<u8> {
    signed_token_with_nonce(imprint, gen_time, &[0x0A, 0x0B])
}

/// Well-formed token echoing `nonce`.
pub fn signed_token_with_nonce(
    imprint: &[u8; DIGEST_LEN],
    gen_time: &str,
    nonce: &[u8],
) -> Vec<u8> {
    wrap_in_content_info(&tst_info(imprint, &[0x01, 0x02], gen_time, nonce))
}

/// Token whose serial number embeds a GeneralizedTime-shaped byte run.
pub fn signed_token_with_decoy_serial(
    imprint: &[u8; DIGEST_LEN],
    gen_time: &str,
    decoy: &str,
) -> Vec<u8> {
    let serial = encode_tlv(tag::GENERALIZED_TIME, decoy.as_bytes());
    wrap_in_content_info(&tst_info(imprint, &serial, gen_time, &[0x0A, 0x0B]))
}

/// DER `SEQUENCE` that is not a `ContentInfo` but still carries an imprint and
/// a time, exercising the byte-scan fallback.
pub fn loose_token(imprint: &[u8; DIGEST_LEN], gen_time: &str) -> Vec<u8> {
    der::sequence(&[
        &oid_der("1.2.3.4"),
        &message_imprint(imprint),
        &encode_tlv(tag::GENERALIZED_TIME, gen_time.as_bytes()),
    ])
}

/// `TimeStampResp` with status `granted` wrapping `token`.
pub fn granted_response(token: &[u8]) -> Vec<u8> {
    let status = der::sequence(&[&der::integer_u64(0)]);
    der::sequence(&[&status, token])
}

/// `TimeStampResp` without a token, with optional free text and one failure bit.
pub fn status_response(code: u64, text: Option<&str>, failure_bit: Option<usize>) -> Vec<u8> {
    let mut info = vec![der::integer_u64(code)];
    if let Some(text) = text {
        info.push(der::sequence(&[&encode_tlv(tag::UTF8_STRING, text.as_bytes())]));
    }
    if let Some(bit) = failure_bit {
        let mut bits = vec![0u8; bit / 8 + 1];
        bits[bit / 8] = 0x80 >> (bit % 8);
        let mut content = vec![(7 - bit % 8) as u8];
        content.extend_from_slice(&bits);
        info.push(encode_tlv(tag::BIT_STRING, &content));
    }
    let refs: Vec<&[u8]> = info.iter().map(Vec::as_slice).collect();
    der::sequence(&[&der::sequence(&refs)])
}

/// `depth` granted responses wrapped around each other, innermost holding
/// `token`. Built in one pass so large depths stay cheap.
pub fn nested_granted_responses(token: &[u8], depth: usize) -> Vec<u8> {
    let status = der::sequence(&[&der::integer_u64(0)]);
    let mut headers = Vec::with_capacity(depth);
    let mut len = token.len();
    for _ in 0..depth {
        len += status.len();
        let header = sequence_header(len);
        len += header.len();
        headers.push(header);
    }

    let mut out = Vec::with_capacity(len);
    for header in headers.iter().rev() {
        out.extend_from_slice(header);
        out.extend_from_slice(&status);
    }
    out.extend_from_slice(token);
    out
}

fn sequence_header(len: usize) -> Vec<u8> {
    let mut out = vec![tag::SEQUENCE];
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out
}

/// Non-`ContentInfo` token carrying an imprint but no `GeneralizedTime`.
pub fn undated_token(imprint: &[u8; DIGEST_LEN]) -> Vec<u8> {
    der::sequence(&[&oid_der("1.2.3.4"), &message_imprint(imprint)])
}
