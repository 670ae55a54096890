mod common;

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use pretty_assertions::assert_eq;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use threadlens_core::error::RetrieveError;
use threadlens_core::retrieve::{
    decode_payload, HttpByteSource, IndirectChannel, IndirectRequest, IndirectResponse,
    ProxyChannel, SecureRetriever,
};

fn direct() -> SecureRetriever {
    SecureRetriever::new(Arc::new(HttpByteSource::default()))
}

/// Indirect channel with a canned reply.
struct CannedChannel(IndirectResponse);

#[async_trait]
impl IndirectChannel for CannedChannel {
    async fn request(&self, _request: IndirectRequest) -> Result<IndirectResponse, RetrieveError> {
        Ok(self.0.clone())
    }
}

#[test]
fn sealed_payload_round_trips() {
    let mapping = common::sample_mapping();
    let (blob, key) = common::seal(&mapping);

    assert_eq!(decode_payload(&blob, Some(&key)).unwrap(), mapping);
}

#[test]
fn wrong_key_fails_authentication() {
    let (blob, _) = common::seal(&common::sample_mapping());
    let other_key = URL_SAFE_NO_PAD.encode([9u8; 32]);

    assert!(matches!(
        decode_payload(&blob, Some(&other_key)),
        Err(RetrieveError::DecryptFailure)
    ));
}

#[test]
fn malformed_keys_and_blobs_are_rejected() {
    let (blob, key) = common::seal(&common::sample_mapping());
    let short_key = URL_SAFE_NO_PAD.encode([1u8; 16]);

    assert!(matches!(
        decode_payload(&blob, Some(&short_key)),
        Err(RetrieveError::InvalidKey)
    ));
    assert!(matches!(
        decode_payload(&blob, Some("not base64 at all!")),
        Err(RetrieveError::InvalidKey)
    ));
    assert!(matches!(
        decode_payload(&blob[..8], Some(&key)),
        Err(RetrieveError::InvalidBlob)
    ));
}

#[test]
fn unkeyed_markup_is_rejected() {
    let page = b"  <!doctype html><html><body>Sign in</body></html>";
    assert!(matches!(
        decode_payload(page, None),
        Err(RetrieveError::UnexpectedContentType)
    ));
    assert!(matches!(
        decode_payload(b"{\"messages\": [", None),
        Err(RetrieveError::MalformedJson(_))
    ));
}

#[test]
fn missing_collections_default_to_empty() {
    let mapping = decode_payload(br#"{"messages": []}"#, None).unwrap();
    assert!(mapping.edits.is_empty());
    assert!(mapping.hunks.is_empty());
    assert!(mapping.edit_hunks.is_empty());
}

#[tokio::test]
async fn fetches_plain_json_directly() {
    let server = MockServer::start().await;
    let mapping = common::sample_mapping();
    Mock::given(method("GET"))
        .and(path("/gm/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&mapping))
        .expect(1)
        .mount(&server)
        .await;

    let resolved = direct()
        .resolve(&format!("{}/gm/abc123", server.uri()))
        .await
        .unwrap();

    assert_eq!(resolved, mapping);
}

#[tokio::test]
async fn legacy_viewer_reference_fetches_the_sealed_blob() {
    let server = MockServer::start().await;
    let mapping = common::sample_mapping();
    let (blob, key) = common::seal(&mapping);
    Mock::given(method("GET"))
        .and(path("/blob/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(blob))
        .expect(1)
        .mount(&server)
        .await;

    let resolved = direct()
        .resolve(&format!("{}/v/abc123#{key}", server.uri()))
        .await
        .unwrap();

    assert_eq!(resolved, mapping);
}

#[tokio::test]
async fn direct_failure_without_indirect_channel_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = direct()
        .resolve(&format!("{}/gm/abc123", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, RetrieveError::Status(403)));
}

#[tokio::test]
async fn indirect_channel_is_used_when_direct_fails() {
    let blocked = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&blocked)
        .await;

    let mapping = common::sample_mapping();
    let (blob, key) = common::seal(&mapping);
    let target = format!("{}/blob/abc123", blocked.uri());

    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fetch"))
        .and(body_json(serde_json::json!({ "url": target })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "status": 200,
            "bytes": STANDARD.encode(&blob),
        })))
        .expect(1)
        .mount(&proxy)
        .await;

    let channel = ProxyChannel::new(reqwest::Client::new(), proxy.uri());
    let retriever = direct().with_indirect(Arc::new(channel));
    let resolved = retriever
        .resolve(&format!("{target}#{key}"))
        .await
        .unwrap();

    assert_eq!(resolved, mapping);
}

#[tokio::test]
async fn indirect_replies_map_to_errors() {
    let blocked = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&blocked)
        .await;
    let url = format!("{}/gm/abc123", blocked.uri());

    let not_found = direct().with_indirect(Arc::new(CannedChannel(IndirectResponse::Reply {
        ok: false,
        status: 404,
        bytes: String::new(),
    })));
    assert!(matches!(
        not_found.resolve(&url).await,
        Err(RetrieveError::Status(404))
    ));

    let failed = direct().with_indirect(Arc::new(CannedChannel(IndirectResponse::Failed {
        error: "upstream timed out".to_owned(),
    })));
    match failed.resolve(&url).await {
        Err(RetrieveError::Indirect(message)) => assert_eq!(message, "upstream timed out"),
        other => panic!("expected indirect failure, got {other:?}"),
    }
}

#[tokio::test]
async fn proxy_failure_without_a_body_reports_its_status() {
    let blocked = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&blocked)
        .await;

    let proxy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fetch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": false,
            "status": 404,
        })))
        .expect(1)
        .mount(&proxy)
        .await;

    let channel = ProxyChannel::new(reqwest::Client::new(), proxy.uri());
    let err = direct()
        .with_indirect(Arc::new(channel))
        .resolve(&format!("{}/gm/abc123", blocked.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, RetrieveError::Status(404)), "got {err:?}");
}

#[tokio::test]
async fn unparseable_reference_is_rejected_before_any_request() {
    let err = direct().resolve("agentexports/gm/abc").await.unwrap_err();
    assert!(matches!(err, RetrieveError::InvalidUrl(_)));
}
