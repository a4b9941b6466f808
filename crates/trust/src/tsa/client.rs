//! Request pipeline shared by both TSA adapters.
//!
//! [`TsaEndpoint::request`] runs one call through
//! `BuildingRequest → AwaitingResponse → ParsingResponse` and always returns a
//! [`TsaResult`]; failures are folded into the result together with the
//! elapsed time.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::{GrantedToken, TrustError, TsaResult, TsaVerifyResult};
use sha2::{Digest, Sha256};
use tracing::{debug, info, info_span, warn, Instrument};

use super::transport::{TransportError, TsaHttpRequest, TsaHttpResponse, TsaTransport};
use super::verify::verify_token;
use crate::asn1::{inspect_token, ObjectIdentifier, TimeStampReq, TimeStampResp, DIGEST_LEN};

/// Stage of a single timestamp request, reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BuildingRequest,
    AwaitingResponse,
    ParsingResponse,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::BuildingRequest => "building_request",
            Phase::AwaitingResponse => "awaiting_response",
            Phase::ParsingResponse => "parsing_response",
        })
    }
}

/// Per-provider additions to the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestOptions<'a> {
    /// `reqPolicy` to place in the `TimeStampReq`.
    pub policy: Option<&'a ObjectIdentifier>,
    /// Complete `Authorization` header value.
    pub authorization: Option<&'a str>,
}

/// One TSA server as seen by an adapter: identity, deadline and transport.
#[derive(Clone)]
pub struct TsaEndpoint {
    provider_name: &'static str,
    server_url: String,
    timeout: Duration,
    transport: Arc<dyn TsaTransport>,
}

impl fmt::Debug for TsaEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsaEndpoint")
            .field("provider_name", &self.provider_name)
            .field("server_url", &self.server_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TsaEndpoint {
    pub fn new(
        provider_name: &'static str,
        server_url: impl Into<String>,
        timeout: Duration,
        transport: Arc<dyn TsaTransport>,
    ) -> Self {
        Self {
            provider_name,
            server_url: server_url.into(),
            timeout,
            transport,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider_name
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Timestamp `content_hash_hex` and describe the outcome.
    pub async fn request(
        &self,
        content: &[u8],
        content_hash_hex: &str,
        options: RequestOptions<'_>,
    ) -> TsaResult {
        let span = info_span!(
            "tsa_request",
            provider = self.provider_name,
            server_url = %self.server_url,
        );
        async {
            let started = Instant::now();
            match self.execute(content, content_hash_hex, options).await {
                Ok(granted) => {
                    let elapsed_ms = elapsed_ms(started);
                    if let Some(warning) = granted.warning.as_deref() {
                        warn!(elapsed_ms, warning, "timestamp granted with parse warning");
                    } else {
                        info!(elapsed_ms, "timestamp granted");
                    }
                    TsaResult::ok(granted, &self.server_url, self.provider_name, elapsed_ms)
                }
                Err(e) => self.fail(&e, started),
            }
        }
        .instrument(span)
        .await
    }

    /// Check a stored token against its content.
    pub fn verify(&self, token: &[u8], original_content: &[u8]) -> TsaVerifyResult {
        let result = verify_token(token, original_content);
        match result.error_message() {
            None => info!(provider = self.provider_name, "timestamp token verified"),
            Some(reason) => warn!(
                provider = self.provider_name,
                reason,
                "timestamp token rejected"
            ),
        }
        result
    }

    /// Build a failed result, logging the cause.
    pub fn fail(&self, error: &TrustError, started: Instant) -> TsaResult {
        let elapsed_ms = elapsed_ms(started);
        warn!(
            provider = self.provider_name,
            server_url = %self.server_url,
            elapsed_ms,
            kind = ?error.kind(),
            error = %error,
            "timestamp request failed"
        );
        TsaResult::error(error, &self.server_url, self.provider_name, elapsed_ms)
    }

    async fn execute(
        &self,
        content: &[u8],
        content_hash_hex: &str,
        options: RequestOptions<'_>,
    ) -> Result<GrantedToken, TrustError> {
        debug!(phase = %Phase::BuildingRequest);
        let digest = parse_digest(content, content_hash_hex)?;
        let request = TimeStampReq::new(digest, options.policy.cloned());

        debug!(phase = %Phase::AwaitingResponse, timeout_ms = self.timeout_ms());
        let response = self
            .transport
            .post(TsaHttpRequest {
                url: self.server_url.clone(),
                body: request.to_der(),
                authorization: options.authorization.map(str::to_owned),
                timeout: self.timeout,
            })
            .await
            .map_err(|e| match e {
                TransportError::Timeout => TrustError::Timeout(self.timeout_ms()),
                other => TrustError::Transport(other.to_string()),
            })?;
        check_status(&response)?;

        debug!(
            phase = %Phase::ParsingResponse,
            status = response.status,
            body_len = response.body.len()
        );
        interpret_response(&request, &response.body)
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Decode the caller's hex digest and check it against the content.
///
/// An empty `content` skips the recomputation, for callers that only hold
/// the digest.
fn parse_digest(content: &[u8], content_hash_hex: &str) -> Result<[u8; DIGEST_LEN], TrustError> {
    let mut digest = [0u8; DIGEST_LEN];
    hex::decode_to_slice(content_hash_hex.trim(), &mut digest).map_err(|_| {
        TrustError::Protocol(format!(
            "content hash must be {} hex characters",
            DIGEST_LEN * 2
        ))
    })?;
    if !content.is_empty() && Sha256::digest(content)[..] != digest[..] {
        return Err(TrustError::Protocol(
            "content hash does not match SHA-256 of the content".into(),
        ));
    }
    Ok(digest)
}

fn check_status(response: &TsaHttpResponse) -> Result<(), TrustError> {
    match response.status {
        200..=299 => Ok(()),
        401 => Err(TrustError::Authentication(
            "TSA rejected the supplied credentials (HTTP 401)".into(),
        )),
        status => {
            let message = hyper::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("unrecognised status")
                .to_owned();
            Err(TrustError::HttpStatus { status, message })
        }
    }
}

/// Turn a 2xx body into a granted token or a protocol error.
fn interpret_response(request: &TimeStampReq, body: &[u8]) -> Result<GrantedToken, TrustError> {
    let requested = hex::encode(request.hashed_message);

    let response = match TimeStampResp::from_der(body) {
        Ok(r) => r,
        Err(e) => {
            return Ok(degraded(
                body.to_vec(),
                requested,
                format!("response could not be decoded ({e}); date taken from local clock"),
            ))
        }
    };
    if !response.status.is_granted() {
        return Err(TrustError::Protocol(response.failure_message()));
    }
    let token = response.token.ok_or_else(|| {
        TrustError::Protocol(format!("{} response carries no token", response.status))
    })?;

    let info = match inspect_token(&token) {
        Ok(info) => info,
        Err(e) => {
            return Ok(degraded(
                token,
                requested,
                format!("token could not be decoded ({e}); date taken from local clock"),
            ))
        }
    };

    if let Some(imprint) = info.message_imprint {
        if imprint != request.hashed_message {
            return Err(TrustError::Protocol(format!(
                "token imprint {} does not match requested hash {requested}",
                hex::encode(imprint)
            )));
        }
    }
    if let Some(nonce) = info.nonce.as_deref() {
        if strip_leading_zeros(nonce) != strip_leading_zeros(&request.nonce) {
            return Err(TrustError::Protocol(
                "token nonce does not match the request".into(),
            ));
        }
    }

    Ok(match info.gen_time {
        Some(timestamp_date) => GrantedToken {
            token,
            timestamp_date,
            message_imprint: requested,
            warning: None,
        },
        None => degraded(
            token,
            requested,
            "signing time not found in token; date taken from local clock".into(),
        ),
    })
}

fn degraded(token: Vec<u8>, message_imprint: String, warning: String) -> GrantedToken {
    GrantedToken {
        token,
        timestamp_date: Utc::now(),
        message_imprint,
        warning: Some(warning),
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::fixtures;
    use crate::tsa::transport::MockTsaTransport;
    use bytes::Bytes;
    use chrono::TimeZone;
    use common::ErrorKind;

    const CONTENT: &[u8] = b"fleet compliance report";

    fn content_hash() -> String {
        hex::encode(Sha256::digest(CONTENT))
    }

    fn endpoint(transport: MockTsaTransport) -> TsaEndpoint {
        TsaEndpoint::new(
            "FreeTSA",
            "https://tsa.example/tsr",
            Duration::from_secs(5),
            Arc::new(transport),
        )
    }

    fn reply(status: u16, body: Vec<u8>) -> Result<TsaHttpResponse, TransportError> {
        Ok(TsaHttpResponse {
            status,
            body: Bytes::from(body),
        })
    }

    /// Transport that answers like a conforming TSA, echoing the nonce.
    fn granting_transport() -> MockTsaTransport {
        let mut transport = MockTsaTransport::new();
        transport.expect_post().times(1).returning(|req| {
            let parsed = TimeStampReq::from_der(&req.body).unwrap();
            let token = fixtures::signed_token_with_nonce(
                &parsed.hashed_message,
                "20240601080000Z",
                &parsed.nonce,
            );
            reply(200, fixtures::granted_response(&token))
        });
        transport
    }

    #[tokio::test]
    async fn granted_response_yields_token_and_date() {
        let result = endpoint(granting_transport())
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;

        assert!(result.success(), "{:?}", result.error_message());
        assert_eq!(
            result.timestamp_date(),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(result.message_imprint(), Some(content_hash().as_str()));
        assert!(result.warning().is_none());
        assert!(result.warning_kind().is_none());
        assert!(result.timestamp_token().is_some());
        assert_eq!(result.provider_name(), "FreeTSA");
        assert_eq!(result.server_url(), "https://tsa.example/tsr");
    }

    #[tokio::test]
    async fn request_carries_der_body_and_no_auth_by_default() {
        let mut transport = MockTsaTransport::new();
        let expected = content_hash();
        transport
            .expect_post()
            .withf(move |req| {
                let parsed = TimeStampReq::from_der(&req.body).unwrap();
                req.authorization.is_none()
                    && req.timeout == Duration::from_secs(5)
                    && parsed.policy.is_none()
                    && parsed.cert_req
                    && hex::encode(parsed.hashed_message) == expected
            })
            .times(1)
            .returning(|_| reply(200, fixtures::status_response(2, None, None)));

        endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
    }

    #[tokio::test]
    async fn rejection_status_is_a_protocol_error() {
        let mut transport = MockTsaTransport::new();
        transport
            .expect_post()
            .returning(|_| reply(200, fixtures::status_response(2, Some("bad policy"), Some(15))));

        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;

        assert!(!result.success());
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        let msg = result.error_message().unwrap();
        assert!(msg.contains("rejection"), "{msg}");
        assert!(msg.contains("bad policy"), "{msg}");
        assert!(msg.contains("unacceptedPolicy"), "{msg}");
    }

    #[tokio::test]
    async fn granted_without_token_is_a_protocol_error() {
        let mut transport = MockTsaTransport::new();
        transport
            .expect_post()
            .returning(|_| reply(200, fixtures::status_response(0, None, None)));

        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        assert!(result.error_message().unwrap().contains("no token"));
    }

    #[tokio::test]
    async fn unauthorised_maps_to_authentication() {
        let mut transport = MockTsaTransport::new();
        transport.expect_post().returning(|_| reply(401, Vec::new()));

        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Authentication));
    }

    #[tokio::test]
    async fn server_error_maps_to_http_status() {
        let mut transport = MockTsaTransport::new();
        transport.expect_post().returning(|_| reply(503, Vec::new()));

        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::HttpStatus));
        let msg = result.error_message().unwrap();
        assert!(msg.contains("503"), "{msg}");
        assert!(msg.contains("Service Unavailable"), "{msg}");
    }

    #[tokio::test]
    async fn timeout_and_connection_failures_are_distinct() {
        let mut transport = MockTsaTransport::new();
        transport
            .expect_post()
            .returning(|_| Err(TransportError::Timeout));
        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        assert!(result.error_message().unwrap().contains("5000 ms"));

        let mut transport = MockTsaTransport::new();
        transport
            .expect_post()
            .returning(|_| Err(TransportError::Connection("connection refused".into())));
        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Transport));
        assert!(result.error_message().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_degraded_success() {
        let mut transport = MockTsaTransport::new();
        transport
            .expect_post()
            .returning(|_| reply(200, b"\x30\x80garbage".to_vec()));

        let before = Utc::now();
        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;

        assert!(result.success());
        assert_eq!(result.timestamp_token(), Some(&b"\x30\x80garbage"[..]));
        assert!(result.timestamp_date().unwrap() >= before);
        assert!(result.warning().unwrap().contains("local clock"));
        assert!(result.error_message().is_none());
    }

    #[tokio::test]
    async fn missing_signing_time_falls_back_to_local_clock() {
        let mut transport = MockTsaTransport::new();
        transport.expect_post().returning(|req| {
            let parsed = TimeStampReq::from_der(&req.body).unwrap();
            let token = fixtures::undated_token(&parsed.hashed_message);
            reply(200, fixtures::granted_response(&token))
        });

        let before = Utc::now();
        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;

        assert!(result.success(), "{:?}", result.error_message());
        assert!(result.timestamp_date().unwrap() >= before);
        assert!(result.warning().unwrap().contains("local clock"));
        assert!(result.error_message().is_none());
        assert_eq!(result.message_imprint(), Some(content_hash().as_str()));
        assert_eq!(result.warning_kind(), Some(ErrorKind::ParseWarning));
    }

    #[tokio::test]
    async fn imprint_mismatch_is_rejected() {
        let mut transport = MockTsaTransport::new();
        transport.expect_post().returning(|req| {
            let parsed = TimeStampReq::from_der(&req.body).unwrap();
            let token =
                fixtures::signed_token_with_nonce(&[0xEE; 32], "20240601080000Z", &parsed.nonce);
            reply(200, fixtures::granted_response(&token))
        });

        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        assert!(result.error_message().unwrap().contains("imprint"));
    }

    #[tokio::test]
    async fn nonce_mismatch_is_rejected() {
        let mut transport = MockTsaTransport::new();
        transport.expect_post().returning(|req| {
            let parsed = TimeStampReq::from_der(&req.body).unwrap();
            let mut nonce = parsed.nonce;
            nonce[7] ^= 0xFF;
            let token = fixtures::signed_token_with_nonce(
                &parsed.hashed_message,
                "20240601080000Z",
                &nonce,
            );
            reply(200, fixtures::granted_response(&token))
        });

        let result = endpoint(transport)
            .request(CONTENT, &content_hash(), RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        assert!(result.error_message().unwrap().contains("nonce"));
    }

    #[tokio::test]
    async fn bad_content_hash_never_reaches_the_network() {
        let mut transport = MockTsaTransport::new();
        transport.expect_post().never();
        let endpoint = endpoint(transport);

        let result = endpoint
            .request(CONTENT, "not-hex", RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));

        let wrong = hex::encode(Sha256::digest(b"other content"));
        let result = endpoint
            .request(CONTENT, &wrong, RequestOptions::default())
            .await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
        assert!(result.error_message().unwrap().contains("does not match"));
    }

    #[tokio::test]
    async fn hash_only_requests_skip_recomputation() {
        let result = endpoint(granting_transport())
            .request(b"", &content_hash().to_uppercase(), RequestOptions::default())
            .await;
        assert!(result.success());
        assert_eq!(result.message_imprint(), Some(content_hash().as_str()));
    }

    #[test]
    fn phase_names_are_snake_case() {
        assert_eq!(Phase::AwaitingResponse.to_string(), "awaiting_response");
    }
}
