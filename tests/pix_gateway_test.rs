//! PIX gateway client tests against a mocked HTTP surface.

use std::time::Duration;

use rust_decimal_macros::dec;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use digicompras_api::config::GatewayConfig;
use digicompras_api::errors::ServiceError;
use digicompras_api::gateway::{CreateIntentRequest, PayerInfo, PaymentGateway, PixGateway};

fn gateway_for(server: &MockServer, timeout_secs: u64) -> PixGateway {
    let config = GatewayConfig {
        base_url: server.uri(),
        access_token: "TEST-TOKEN".to_string(),
        timeout_secs,
        payment_method_id: "pix".to_string(),
        payer_email_domain: "exemplo.com".to_string(),
    };
    PixGateway::new(&config).expect("client builds")
}

fn request() -> CreateIntentRequest {
    CreateIntentRequest {
        amount: dec!(141.075),
        description: "a1b2c3d4 - multiple items".to_string(),
        payer: PayerInfo {
            email: "cliente_1@exemplo.com".to_string(),
            first_name: "Maria".to_string(),
        },
        external_reference: "a1b2c3d4".to_string(),
    }
}

#[tokio::test]
async fn create_intent_posts_pix_payment_and_extracts_qr_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .and(body_partial_json(serde_json::json!({
            "payment_method_id": "pix",
            "external_reference": "a1b2c3d4",
            "transaction_amount": 141.075
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": 123456789,
            "status": "pending",
            "point_of_interaction": {
                "transaction_data": {"qr_code": "00020126580014br.gov.bcb.pix..."}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = gateway_for(&server, 10)
        .create_intent(request())
        .await
        .unwrap();
    assert_eq!(intent.id, "123456789");
    assert_eq!(intent.status, "pending");
    assert!(intent.qr_code.unwrap().starts_with("000201"));
}

#[tokio::test]
async fn create_intent_client_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid payer"))
        .mount(&server)
        .await;

    let err = gateway_for(&server, 10)
        .create_intent(request())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GatewayRejected(_)));
}

#[tokio::test]
async fn create_intent_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = gateway_for(&server, 10)
        .create_intent(request())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GatewayUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn slow_gateway_times_out_as_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_delay(Duration::from_secs(3))
                .set_body_json(serde_json::json!({"id": 1, "status": "pending"})),
        )
        .mount(&server)
        .await;

    let err = gateway_for(&server, 1)
        .create_intent(request())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::GatewayUnavailable(_)));
}

#[tokio::test]
async fn search_by_external_reference_returns_latest_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/search"))
        .and(query_param("external_reference", "a1b2c3d4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                {"id": 111, "status": "approved"},
                {"id": 110, "status": "cancelled"}
            ]
        })))
        .mount(&server)
        .await;

    let intent = gateway_for(&server, 10)
        .find_by_external_reference("a1b2c3d4")
        .await
        .unwrap()
        .expect("intent found");
    assert_eq!(intent.id, "111");
    assert_eq!(intent.status, "approved");
}

#[tokio::test]
async fn search_with_no_results_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})),
        )
        .mount(&server)
        .await;

    let found = gateway_for(&server, 10)
        .find_by_external_reference("missing1")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn get_by_id_returns_current_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 123456789,
            "status": "approved"
        })))
        .mount(&server)
        .await;

    let intent = gateway_for(&server, 10).get_by_id("123456789").await.unwrap();
    assert_eq!(intent.status, "approved");
    assert!(intent.qr_code.is_none());
}

#[tokio::test]
async fn malformed_body_is_unavailable_not_a_crash() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/77"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = gateway_for(&server, 10).get_by_id("77").await.unwrap_err();
    assert!(matches!(err, ServiceError::GatewayUnavailable(_)));
}
