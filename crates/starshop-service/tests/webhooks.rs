//! Crypto Pay webhook integration tests.

mod common;

use common::{to, TestHarness, BUYER, CRYPTOPAY_TOKEN};
use serde_json::{json, Value};

use starshop_core::RequestCode;
use starshop_service::crypto::{hmac_sha256_hex, sha256};
use starshop_service::gateway::TopupPayload;

// ============================================================================
// Helpers
// ============================================================================

fn paid_update(payload: &TopupPayload) -> String {
    json!({
        "update_id": 1,
        "update_type": "invoice_paid",
        "request_date": "2026-10-17T10:00:00.000Z",
        "payload": {
            "invoice_id": 500,
            "status": "paid",
            "payload": serde_json::to_string(payload).unwrap()
        }
    })
    .to_string()
}

fn sign(body: &str) -> String {
    hmac_sha256_hex(&sha256(CRYPTOPAY_TOKEN.as_bytes()), body.as_bytes()).unwrap()
}

async fn deliver(harness: &TestHarness, body: &str, signature: &str) -> axum_test::TestResponse {
    harness
        .server
        .post("/webhooks/cryptopay")
        .add_header("crypto-pay-api-signature", signature)
        .text(body.to_string())
        .await
}

async fn poll(harness: &TestHarness) -> Vec<Value> {
    let response = harness
        .server
        .get("/v1/outbox")
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["messages"].as_array().cloned().unwrap_or_default()
}

// ============================================================================
// Signature
// ============================================================================

#[tokio::test]
async fn unsigned_webhook_is_rejected() {
    let harness = TestHarness::new();
    let body = paid_update(&TopupPayload::new(BUYER, RequestCode::generate(), 50_000));

    let response = harness
        .server
        .post("/webhooks/cryptopay")
        .text(body.clone())
        .await;
    response.assert_status_bad_request();

    deliver(&harness, &body, &sign("{}")).await.assert_status_bad_request();
    assert!(poll(&harness).await.is_empty());
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
async fn webhook_settles_pending_invoice_once() {
    let harness = TestHarness::new();
    harness.press(BUYER, "topup_amount:500").await;
    harness.press(BUYER, "pay_ton").await;
    let code = harness.gateway.requests.lock().unwrap()[0].code.clone();

    let body = paid_update(&TopupPayload::new(BUYER, code, 50_000));
    deliver(&harness, &body, &sign(&body)).await.assert_status_ok();
    deliver(&harness, &body, &sign(&body)).await.assert_status_ok();

    let notices = poll(&harness).await;
    assert_eq!(to(&notices, BUYER).len(), 1);
    assert!(notices[0]["text"].as_str().unwrap().contains("500.00 ₽"));

    let messages = harness.press(BUYER, "check_crypto").await;
    assert!(messages[0]["text"].as_str().unwrap().contains("Нет ожидающих"));
}

#[tokio::test]
async fn webhook_after_restart_credits_signed_amount() {
    let harness = TestHarness::new();
    harness.press(BUYER, "topup_amount:300").await;
    harness.press(BUYER, "pay_usdt").await;
    let code = harness.gateway.requests.lock().unwrap()[0].code.clone();

    let harness = harness.restart();

    let body = paid_update(&TopupPayload::new(BUYER, code, 30_000));
    deliver(&harness, &body, &sign(&body)).await.assert_status_ok();
    deliver(&harness, &body, &sign(&body)).await.assert_status_ok();

    // Notifications ride along with the next event response.
    let messages = harness.press(BUYER, "balance").await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["text"], "Ваш баланс: 300.00 ₽");
}

#[tokio::test]
async fn foreign_updates_are_acknowledged() {
    let harness = TestHarness::new();
    let body = json!({
        "update_id": 2,
        "update_type": "invoice_paid",
        "payload": {"invoice_id": 9, "status": "paid", "payload": "donation"}
    })
    .to_string();

    let response = deliver(&harness, &body, &sign(&body)).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["received"], true);
    assert!(poll(&harness).await.is_empty());
}
