//! HTTP client and provider tests
//!
//! Exercise the retrying client and the JSON providers against a local
//! wiremock server.

use std::num::NonZeroU32;
use std::time::Duration;

use assert_matches::assert_matches;
use canopy::enrichment::providers::{
    HttpFieldProvider, HttpImageSource, HttpTranslationProvider, ImageSourceSettings,
};
use canopy::enrichment::{FieldProvider, ImageSearch, ImageSourceProvider, TranslationProvider};
use canopy::http::{ensure_success, HttpError, RetryPolicy, RetryingClient};
use canopy_common::{FieldKey, SourceId};
use serde_json::json;
use std::collections::BTreeMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(40),
        attempt_timeout: Duration::from_secs(2),
    }
}

fn client() -> RetryingClient {
    RetryingClient::new(fast_policy()).unwrap()
}

/// Serve headers and part of the body, then stall without closing.
async fn stalled_body_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"content\": ",
                    )
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });
    format!("http://{addr}")
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

// ---------------------------------------------------------------------------
// RetryingClient
// ---------------------------------------------------------------------------

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = client();
    let response = client
        .send(client.get(&format!("{}/flaky", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn client_errors_are_returned_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client();
    let response = client
        .send(client.get(&format!("{}/missing", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(request_count(&server).await, 1);
    assert_matches!(ensure_success(response), Err(HttpError::Status { status, .. }) if status == 404);
}

#[tokio::test]
async fn exhausted_retries_return_last_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client();
    let response = client
        .send(client.post(&server.uri()).json(&json!({"a": 1})))
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn slow_attempts_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = RetryingClient::new(RetryPolicy {
        max_retries: 1,
        attempt_timeout: Duration::from_millis(100),
        ..fast_policy()
    })
    .unwrap();

    let err = client.send(client.get(&server.uri())).await.unwrap_err();
    assert_matches!(err, HttpError::Timeout { .. });
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn stalled_body_is_bounded_by_attempt_timeout() {
    let uri = stalled_body_server().await;
    let client = RetryingClient::new(RetryPolicy {
        max_retries: 1,
        attempt_timeout: Duration::from_millis(200),
        ..fast_policy()
    })
    .unwrap();

    let response = client.send(client.get(&uri)).await.unwrap();
    let body = tokio::time::timeout(Duration::from_secs(3), response.bytes())
        .await
        .expect("body read should not outlive the attempt timeout");
    assert!(body.is_err());
}

#[tokio::test]
async fn field_provider_gives_up_on_stalled_body() {
    let uri = stalled_body_server().await;
    let client = RetryingClient::new(RetryPolicy {
        max_retries: 1,
        attempt_timeout: Duration::from_millis(200),
        ..fast_policy()
    })
    .unwrap();
    let provider = HttpFieldProvider::new(client, format!("{uri}/fill"), None);

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        provider.generate("Ficus lyrata", FieldKey::Watering, &BTreeMap::new()),
    )
    .await
    .expect("field generation should not hang on a stalled body");
    assert!(result.is_err());
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let client = RetryingClient::new(RetryPolicy {
        max_retries: 1,
        ..fast_policy()
    })
    .unwrap();

    // Port 9 (discard) is essentially never listening on loopback.
    let err = client.send(client.get("http://127.0.0.1:9/")).await.unwrap_err();
    assert_matches!(err, HttpError::Transport { .. });
    assert!(err.is_connectivity());
}

#[tokio::test]
async fn invalid_urls_fail_before_sending() {
    let client = client();
    let err = client.send(client.get("not a url")).await.unwrap_err();
    assert_matches!(err, HttpError::InvalidRequest(_));
}

// ---------------------------------------------------------------------------
// Field provider
// ---------------------------------------------------------------------------

#[tokio::test]
async fn field_provider_sends_context_and_reads_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/fill"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({
            "plant_name": "Ficus lyrata",
            "field": "watering",
            "context": { "family": "Moraceae" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "Water when the top 5 cm of soil is dry"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpFieldProvider::new(
        client(),
        format!("{}/fill", server.uri()),
        Some("secret".to_string()),
    );
    let context = BTreeMap::from([(FieldKey::Family, json!("Moraceae"))]);

    let value = provider
        .generate("Ficus lyrata", FieldKey::Watering, &context)
        .await
        .unwrap();
    assert_eq!(value, json!("Water when the top 5 cm of soil is dry"));
}

#[tokio::test]
async fn field_provider_rejects_null_content_and_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": null })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/denied"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = HttpFieldProvider::new(client(), format!("{}/null", server.uri()), None);
    let err = provider
        .generate("Pilea", FieldKey::Soil, &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("no content"), "{err:#}");

    let provider = HttpFieldProvider::new(client(), format!("{}/denied", server.uri()), None);
    let err = provider
        .generate("Pilea", FieldKey::Soil, &BTreeMap::new())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("401"), "{err:#}");
}

// ---------------------------------------------------------------------------
// Translation provider
// ---------------------------------------------------------------------------

#[tokio::test]
async fn translation_provider_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "text": "Geldbaum", "target_language": "en" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "translated": " Jade plant " })))
        .mount(&server)
        .await;

    let provider = HttpTranslationProvider::new(client(), server.uri(), None, "en");
    assert_eq!(provider.translate("Geldbaum").await.unwrap(), "Jade plant");
}

#[tokio::test]
async fn empty_translation_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "translated": "  " })))
        .mount(&server)
        .await;

    let provider = HttpTranslationProvider::new(client(), server.uri(), None, "en");
    assert!(provider.translate("Geldbaum").await.is_err());
}

// ---------------------------------------------------------------------------
// Image source
// ---------------------------------------------------------------------------

fn source_settings(endpoint: String) -> ImageSourceSettings {
    ImageSourceSettings {
        id: SourceId::new("wiki"),
        label: "Wiki Commons".to_string(),
        endpoint,
        api_key: None,
        requires_api_key: false,
        requests_per_second: NonZeroU32::new(50).unwrap(),
    }
}

#[tokio::test]
async fn image_source_parses_hits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Monstera deliciosa"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [
                { "url": "https://img.test/1.jpg", "license": "CC-BY-4.0", "width": 800, "height": 600 },
                { "url": "" },
                { "url": "https://img.test/2.jpg", "attribution": "J. Doe" }
            ]
        })))
        .mount(&server)
        .await;

    let source = HttpImageSource::new(client(), source_settings(format!("{}/search", server.uri())));
    let result = source.search("Monstera deliciosa", 3).await.unwrap();

    let ImageSearch::Found(images) = result else {
        panic!("expected images");
    };
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].url, "https://img.test/1.jpg");
    assert_eq!(images[0].source, SourceId::new("wiki"));
    assert_eq!(images[0].license.as_deref(), Some("CC-BY-4.0"));
    assert_eq!(images[0].width, Some(800));
    assert_eq!(images[1].attribution.as_deref(), Some("J. Doe"));
}

#[tokio::test]
async fn image_source_passes_on_declines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [],
            "declined": "term is ambiguous"
        })))
        .mount(&server)
        .await;

    let source = HttpImageSource::new(client(), source_settings(server.uri()));
    assert_eq!(
        source.search("Ivy", 3).await.unwrap(),
        ImageSearch::Declined("term is ambiguous".to_string())
    );
}

#[tokio::test]
async fn image_source_sends_key_and_reports_availability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer k-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "images": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let keyless = HttpImageSource::new(
        client(),
        ImageSourceSettings {
            requires_api_key: true,
            ..source_settings(server.uri())
        },
    );
    assert!(!keyless.is_available());

    let keyed = HttpImageSource::new(
        client(),
        ImageSourceSettings {
            requires_api_key: true,
            api_key: Some("k-123".to_string()),
            ..source_settings(server.uri())
        },
    );
    assert!(keyed.is_available());
    assert_eq!(
        keyed.search("Fern", 3).await.unwrap(),
        ImageSearch::Found(Vec::new())
    );
}

#[tokio::test]
async fn malformed_search_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let source = HttpImageSource::new(client(), source_settings(server.uri()));
    let err = source.search("Fern", 3).await.unwrap_err();
    assert!(format!("{err:#}").contains("malformed"), "{err:#}");
}
