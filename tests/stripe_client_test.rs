use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coursehub_service::services::{
    payment_service::{Metadata, PaymentProcessor, ProcessorError},
    stripe_client::StripeClient,
};

fn intent_body(id: &str, status: &str, amount: i64) -> serde_json::Value {
    json!({
        "id": id,
        "object": "payment_intent",
        "client_secret": format!("{}_secret_abc", id),
        "amount": amount,
        "currency": "usd",
        "status": status,
        "metadata": { "courseId": "c1", "userId": "u1" },
        "customer": "cus_1",
        "created": 1_700_000_000
    })
}

#[tokio::test]
async fn test_create_payment_intent_posts_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(header("authorization", "Bearer sk_test_123"))
        .and(body_string_contains("amount=8000"))
        .and(body_string_contains("currency=usd"))
        .and(body_string_contains("customer=cus_1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(intent_body("pi_1", "requires_payment_method", 8000)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", server.uri());
    let mut metadata = Metadata::new();
    metadata.insert("courseId".to_string(), "c1".to_string());

    let intent = client
        .create_payment_intent(8000, "USD", &metadata, Some("cus_1"))
        .await
        .unwrap();

    assert_eq!(intent.id, "pi_1");
    assert_eq!(intent.amount, 8000);
    assert_eq!(intent.client_secret.as_deref(), Some("pi_1_secret_abc"));
    assert_eq!(intent.metadata.get("userId").map(String::as_str), Some("u1"));
}

#[tokio::test]
async fn test_retrieve_payment_intent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(intent_body("pi_2", "succeeded", 1500)))
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", format!("{}/", server.uri()));
    let intent = client.retrieve_payment_intent("pi_2").await.unwrap();

    assert_eq!(intent.status, "succeeded");
    assert_eq!(intent.customer.as_deref(), Some("cus_1"));
}

#[tokio::test]
async fn test_api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "message": "No such payment_intent: 'pi_missing'"
            }
        })))
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", server.uri());
    let err = client.retrieve_payment_intent("pi_missing").await.unwrap_err();

    match err {
        ProcessorError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "No such payment_intent: 'pi_missing'");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_create_customer_and_refund() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .and(body_string_contains("email=jane%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_9", "object": "customer" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .and(body_string_contains("payment_intent=pi_3"))
        .and(body_string_contains("amount=550"))
        .and(body_string_contains("reason=requested_by_customer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "re_1",
            "amount": 550,
            "status": "succeeded"
        })))
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", server.uri());

    let customer = client
        .create_customer("jane@example.com", "Jane Doe", &Metadata::new())
        .await
        .unwrap();
    assert_eq!(customer.id, "cus_9");

    let refund = client
        .create_refund("pi_3", Some(550), "requested_by_customer")
        .await
        .unwrap();
    assert_eq!(refund.id, "re_1");
    assert_eq!(refund.amount, 550);
}

#[tokio::test]
async fn test_list_payment_intents() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payment_intents"))
        .and(query_param("customer", "cus_1"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                intent_body("pi_a", "succeeded", 1000),
                intent_body("pi_b", "canceled", 2000)
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", server.uri());
    let intents = client.list_payment_intents("cus_1", 10).await.unwrap();

    assert_eq!(intents.len(), 2);
    assert_eq!(intents[1].status, "canceled");
}

#[tokio::test]
async fn test_unreachable_processor() {
    let client = StripeClient::new("sk_test_123", "http://127.0.0.1:9");
    let err = client.retrieve_payment_intent("pi_1").await.unwrap_err();
    assert!(matches!(err, ProcessorError::Http(_)));
}

#[tokio::test]
async fn test_malformed_intent_id_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let client = StripeClient::new("sk_test_123", server.uri());
    let err = client
        .retrieve_payment_intent("pi_1/../../customers")
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessorError::InvalidId(_)));

    let err = client
        .create_refund("pi_1?expand[]=customer", None, "requested_by_customer")
        .await
        .unwrap_err();
    assert!(matches!(err, ProcessorError::InvalidId(_)));
}
