use binlookup_core::LookupError;
use binlookup_gateway::app::CardDataProviderPort;
use binlookup_gateway::infra::ProviderClient;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, timeout: Duration) -> ProviderClient {
    ProviderClient::with_timeout(
        &format!("{}/bin-lookup", server.uri()),
        "test-user",
        "test-key",
        timeout,
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_sends_credentials_and_parses_record() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bin-lookup"))
        .and(query_param("bin-number", "411111111111"))
        .and(header("user-id", "test-user"))
        .and(header("api-key", "test-key"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bin-number": "411111",
            "country": "United States",
            "country-code": "US",
            "card-brand": "VISA",
            "is-prepaid": false,
            "valid": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let record = client.fetch("411111111111").await.unwrap().unwrap();

    assert_eq!(record.bin_prefix, "411111");
    assert_eq!(record.country_code, "US");
    assert_eq!(record.card_brand, "VISA");
    assert!(record.valid);
}

#[tokio::test]
async fn test_non_success_status_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.fetch("411111").await.unwrap_err();

    assert!(matches!(err, LookupError::UpstreamStatus { status: 403 }));
}

#[tokio::test]
async fn test_empty_body_is_no_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    assert!(client.fetch("411111").await.unwrap().is_none());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    let err = client.fetch("411111").await.unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"valid": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_millis(100));
    let err = client.fetch("411111").await.unwrap_err();
    assert_eq!(err.kind(), "timeout");
}
