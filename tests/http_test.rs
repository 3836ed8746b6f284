mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use store_payments::domain::gateway::PaymentGateway;
use store_payments::domain::store::ItemStatus;
use store_payments::domain::transaction::TransactionStatus;
use store_payments::services::checkout::Checkout;
use store_payments::services::reconciler::Reconciler;
use store_payments::{AppState, app};
use tower::ServiceExt;

struct TestApp {
    state: AppState,
    store: Arc<MemoryTransactions>,
    catalog: Arc<MemoryCatalog>,
}

fn test_app(script: ChargeScript, webhook_secret: Option<&str>) -> TestApp {
    let store = MemoryTransactions::new();
    let catalog = MemoryCatalog::with_items(&["acc-1"]);
    let gateway = ScriptedGateway::new(script);
    let reconciler = Reconciler::new(
        store.clone(),
        catalog.clone(),
        gateway.clone() as Arc<dyn PaymentGateway>,
        Duration::from_secs(30),
    );
    let state = AppState {
        checkout: Arc::new(checkout(&store, &catalog, &gateway)),
        reconciler: Some(Arc::new(reconciler)),
        webhook_secret: webhook_secret.map(Arc::from),
    };
    TestApp {
        state,
        store,
        catalog,
    }
}

fn unconfigured_app() -> AppState {
    let store = MemoryTransactions::new();
    let catalog = MemoryCatalog::with_items(&["acc-1"]);
    AppState {
        checkout: Arc::new(Checkout::new(store, catalog, None, settings())),
        reconciler: None,
        webhook_secret: None,
    }
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn pix_body() -> Value {
    serde_json::json!({
        "payment_method_id": "pix",
        "amount": 150.0,
        "email": "buyer@example.com",
        "identification_type": "CPF",
        "identification_number": VALID_CPF,
        "payer_name": "Maria Silva",
        "account_id": "acc-1",
        "user_id": "user-1"
    })
}

fn card_body() -> Value {
    let mut body = pix_body();
    body["payment_method_id"] = Value::from("visa");
    body["token"] = Value::from(CARD_TOKEN);
    body["installments"] = Value::from(1);
    body["issuer_id"] = Value::from("25");
    body
}

fn payment_notification(id: &str) -> String {
    serde_json::json!({"type": "payment", "action": "payment.updated", "data": {"id": id}}).to_string()
}

fn signature(secret: &str, data_id: &str, request_id: &str, ts: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("id:{data_id};request-id:{request_id};ts:{ts};").as_bytes());
    format!("ts={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn health_check_answers_ok() {
    let app = app(test_app(ChargeScript::Approve, None).state);
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn malformed_payment_body_is_invalid_request() {
    let (status, body) = send(
        test_app(ChargeScript::Approve, None).state,
        post_json("/payments", "{not json"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn unreadable_payment_body_still_answers_200() {
    let (status, body) = send(
        test_app(ChargeScript::Approve, None).state,
        post_json("/payments", b"{\xff}".to_vec()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "invalid_request");

    let oversized = format!("{{\"payer_name\": \"{}\"}}", "x".repeat(store_payments::MAX_BODY_BYTES + 1));
    let t = test_app(ChargeScript::Approve, None);
    let (status, body) = send(t.state, post_json("/payments", oversized)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error_code"], "invalid_request");
    assert!(t.store.all().is_empty());
}

#[tokio::test]
async fn validation_errors_are_listed() {
    let mut raw = pix_body();
    raw["email"] = Value::from("nope");
    raw["amount"] = Value::from(0);

    let (status, body) = send(
        test_app(ChargeScript::Approve, None).state,
        post_json("/payments", raw.to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "invalid_amount");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["amount", "email"]);
}

#[tokio::test]
async fn missing_credentials_reported_on_payment() {
    let raw = pix_body().to_string();
    let (status, body) = send(unconfigured_app(), post_json("/payments", raw)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error_code"], "missing_access_token");
}

#[tokio::test]
async fn pix_payment_returns_qr_code() {
    let t = test_app(ChargeScript::Pend, None);
    let raw = pix_body().to_string();

    let (status, body) = send(t.state.clone(), post_json("/payments", raw)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["status"], "pending");
    assert_eq!(body["payment"]["transaction_amount"], 150.0);
    assert!(body["qr_code"].as_str().unwrap().starts_with("0002"));
    assert!(body["qr_code_base64"].is_string());
    assert!(body["expires_at"].is_string());
    assert_eq!(t.store.all()[0].status, TransactionStatus::Pending);
}

#[tokio::test]
async fn approved_card_payment_succeeds() {
    let t = test_app(ChargeScript::Approve, None);
    let raw = card_body().to_string();

    let (_, body) = send(t.state.clone(), post_json("/payments", raw)).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["status"], "approved");
    assert_eq!(body["payment"]["installments"], 1);
    assert!(body.get("qr_code").is_none());
    assert_eq!(t.catalog.status("acc-1"), Some(ItemStatus::Sold));
}

#[tokio::test]
async fn webhook_without_credentials_is_unavailable() {
    let (status, _) = send(
        unconfigured_app(),
        post_json("/webhooks/mercado-pago", payment_notification("1")),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn malformed_notification_is_bad_request() {
    let (status, body) = send(
        test_app(ChargeScript::Pend, None).state,
        post_json("/webhooks/mercado-pago", "[1, 2"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "invalid_notification");
}

#[tokio::test]
async fn bad_signature_is_unauthorized() {
    let t = test_app(ChargeScript::Pend, Some("s3cret"));
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/mercado-pago")
        .header("content-type", "application/json")
        .header("x-request-id", "req-1")
        .header("x-signature", signature("wrong", "1000", "req-1", "1704908010"))
        .body(Body::from(payment_notification("1000")))
        .unwrap();

    let (status, body) = send(t.state, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "webhook_error");
}

#[tokio::test]
async fn non_payment_topic_is_ignored() {
    let request = post_json(
        "/webhooks/mercado-pago?topic=merchant_order&id=77",
        Body::empty(),
    );
    let (status, body) = send(test_app(ChargeScript::Pend, None).state, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn unknown_payment_is_acknowledged() {
    let (status, body) = send(
        test_app(ChargeScript::Pend, None).state,
        post_json("/webhooks/mercado-pago", payment_notification("424242")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unknown_payment");
}

#[tokio::test]
async fn signed_webhook_completes_pix_payment() {
    let t = test_app(ChargeScript::Pend, Some("s3cret"));
    let raw = pix_body().to_string();
    let (_, created) = send(t.state.clone(), post_json("/payments", raw)).await;
    let payment_id = created["payment"]["id"].as_str().unwrap().to_string();

    let signed = || {
        Request::builder()
            .method("POST")
            .uri(format!("/webhooks/mercado-pago?type=payment&data.id={payment_id}"))
            .header("content-type", "application/json")
            .header("x-request-id", "req-9")
            .header("x-signature", signature("s3cret", &payment_id, "req-9", "1704908010"))
            .body(Body::from(payment_notification(&payment_id)))
            .unwrap()
    };

    let (status, body) = send(t.state.clone(), signed()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let tx = t.store.all().pop().unwrap();
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert!(tx.webhook_processed);
    assert_eq!(t.catalog.status("acc-1"), Some(ItemStatus::Sold));

    let (status, body) = send(t.state, signed()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "duplicate");
}
