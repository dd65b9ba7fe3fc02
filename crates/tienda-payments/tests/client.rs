//! Integration tests for `PaymentClient` using wiremock HTTP mocks.

use tienda_payments::{PaymentClient, PaymentError, PaymentStatus, PreferenceLine};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> PaymentClient {
    PaymentClient::new(
        base_url,
        Some("test-token".to_string()),
        "http://localhost:3000/checkout",
        30,
    )
    .expect("client construction should not fail")
}

#[tokio::test]
async fn create_preference_returns_checkout_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/preferences"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(serde_json::json!({
            "external_reference": "42",
            "back_urls": {
                "success": "http://localhost:3000/checkout/success"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "pref-123",
            "init_point": "https://gateway.test/checkout/pref-123"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let lines = vec![
        PreferenceLine::new("prod-1", "Mate Imperial", 2, "1500.00".parse().unwrap()),
        PreferenceLine::new("SHIPPING", "Costo de envío", 1, "10000".parse().unwrap()),
    ];

    let url = client
        .create_preference(42, &lines)
        .await
        .expect("preference should be created");

    assert_eq!(url, "https://gateway.test/checkout/pref-123");
}

#[tokio::test]
async fn create_preference_surfaces_gateway_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/checkout/preferences"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad collector"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let lines = vec![PreferenceLine::new("p", "x", 1, "1".parse().unwrap())];
    let err = client.create_preference(1, &lines).await.unwrap_err();

    assert!(
        matches!(err, PaymentError::Gateway { status: 400, ref body } if body == "bad collector"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn get_payment_status_maps_approved() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payments/pay-777"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 777,
            "status": "approved"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client.get_payment_status("pay-777").await.unwrap();
    assert_eq!(status, PaymentStatus::Approved);
}

#[tokio::test]
async fn get_payment_status_carries_raw_non_approved() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payments/pay-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "in_process"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let status = client.get_payment_status("pay-1").await.unwrap();
    assert_eq!(status, PaymentStatus::Other("in_process".to_string()));
    assert_eq!(status.as_str(), "in_process");
}

#[tokio::test]
async fn missing_token_fails_without_network() {
    let client = PaymentClient::new("https://unreachable.test", None, "http://localhost", 5)
        .expect("construction is infallible without a token");

    let err = client.get_payment_status("pay-1").await.unwrap_err();
    assert!(matches!(err, PaymentError::MissingAccessToken));
}
