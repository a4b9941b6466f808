//! Offline check of a stored token against the document it certifies.

use common::TsaVerifyResult;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::asn1::inspect_token;

/// Recompute SHA-256 of `original_content` and compare it with the token's
/// message imprint.
///
/// The signing time is returned when the token carries one. Signatures and
/// certificates are not validated.
pub fn verify_token(token: &[u8], original_content: &[u8]) -> TsaVerifyResult {
    if token.is_empty() {
        return TsaVerifyResult::invalid(None, "timestamp token is empty");
    }
    let expected = hex::encode(Sha256::digest(original_content));

    let info = match inspect_token(token) {
        Ok(info) => info,
        Err(e) => {
            debug!(error = %e, "timestamp token could not be decoded");
            return TsaVerifyResult::invalid(
                None,
                format!("timestamp token could not be decoded: {e}"),
            );
        }
    };
    let Some(found) = info.message_imprint_hex() else {
        return TsaVerifyResult::invalid(None, "no SHA-256 message imprint found in token");
    };

    if !found.eq_ignore_ascii_case(&expected) {
        debug!(token_imprint = %found, content_hash = %expected, "imprint mismatch");
        return TsaVerifyResult::invalid(
            Some(found),
            "message imprint does not match the content",
        );
    }
    TsaVerifyResult::valid(info.gen_time, found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::fixtures;
    use chrono::{TimeZone, Utc};

    fn digest(content: &[u8]) -> [u8; 32] {
        Sha256::digest(content).into()
    }

    #[test]
    fn matching_content_is_valid() {
        let content = b"quarterly driver hours";
        let token = fixtures::signed_token(&digest(content), "20240315101500Z");

        let result = verify_token(&token, content);
        assert!(result.is_valid(), "{:?}", result.error_message());
        assert_eq!(
            result.timestamp_date(),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 10, 15, 0).unwrap())
        );
        assert_eq!(
            result.message_imprint(),
            Some(hex::encode(digest(content)).as_str())
        );
    }

    #[test]
    fn tampered_content_is_invalid() {
        let token = fixtures::signed_token(&digest(b"original"), "20240315101500Z");

        let result = verify_token(&token, b"original!");
        assert!(!result.is_valid());
        assert!(result.timestamp_date().is_none());
        assert_eq!(
            result.message_imprint(),
            Some(hex::encode(digest(b"original")).as_str())
        );
        assert!(result.error_message().unwrap().contains("does not match"));
    }

    #[test]
    fn full_response_bodies_are_accepted() {
        let content = b"stored with the status wrapper";
        let token = fixtures::signed_token(&digest(content), "20240315101500Z");
        let body = fixtures::granted_response(&token);
        assert!(verify_token(&body, content).is_valid());
    }

    #[test]
    fn scanned_tokens_still_verify() {
        let content = b"legacy token layout";
        let token = fixtures::loose_token(&digest(content), "20231201000000Z");
        let result = verify_token(&token, content);
        assert!(result.is_valid());
        assert!(result.timestamp_date().is_some());
    }

    #[test]
    fn unreadable_tokens_are_invalid() {
        assert!(!verify_token(&[], b"x").is_valid());
        let result = verify_token(&[0x04, 0x01, 0x00], b"x");
        assert!(!result.is_valid());
        assert!(result.error_message().unwrap().contains("could not be decoded"));
    }

    #[test]
    fn nested_response_wrappers_are_invalid() {
        let content = b"doc";
        let token = fixtures::signed_token(&digest(content), "20240315101500Z");

        let once_too_many = fixtures::nested_granted_responses(&token, 2);
        let result = verify_token(&once_too_many, content);
        assert!(!result.is_valid());
        assert!(result.error_message().unwrap().contains("nested"));

        let deep = fixtures::nested_granted_responses(&token, 60_000);
        assert!(!verify_token(&deep, content).is_valid());
    }
}
