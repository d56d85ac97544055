//! Event API integration tests.

mod common;

use common::{button, to, TestHarness, ADMIN, BUYER};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

/// File a bank-transfer topup and return the admin's approve button.
async fn file_topup(harness: &TestHarness, rub: i64) -> String {
    harness.press(BUYER, &format!("topup_amount:{rub}")).await;
    let messages = harness.press(BUYER, "paid:sbp").await;
    let admin = to(&messages, ADMIN);
    assert_eq!(admin.len(), 1, "every admin is notified");
    button(&admin[0], "topup_ok:")
}

/// Place a manual order and return the admin's approve button.
async fn place_order(harness: &TestHarness, quantity: u32) -> String {
    let messages = harness.press(BUYER, &format!("buy:{quantity}")).await;
    button(&to(&messages, ADMIN)[0], "order_ok:")
}

async fn balance_text(harness: &TestHarness) -> String {
    let messages = harness.press(BUYER, "balance").await;
    messages[0]["text"].as_str().unwrap().to_string()
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn events_require_service_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/events")
        .json(&json!({"user_id": 1001, "type": "text", "text": "/start"}))
        .await;
    response.assert_status_unauthorized();

    let response = harness
        .server
        .post("/v1/events")
        .add_header("x-api-key", "wrong-key")
        .json(&json!({"user_id": 1001, "type": "text", "text": "/start"}))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn outbox_requires_service_key() {
    let harness = TestHarness::new();

    harness.server.get("/v1/outbox").await.assert_status_unauthorized();

    let response = harness
        .server
        .get("/v1/outbox")
        .add_header("x-api-key", &harness.service_api_key)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["messages"], json!([]));
}

// ============================================================================
// Conversation
// ============================================================================

#[tokio::test]
async fn start_shows_price_and_menu() {
    let harness = TestHarness::new();

    let messages = harness.say(BUYER, "/start").await;

    assert_eq!(messages.len(), 1);
    assert!(messages[0]["text"].as_str().unwrap().contains("1.50 ₽"));
    assert_eq!(button(&messages[0], "buy"), "buy_menu");
}

#[tokio::test]
async fn topup_and_order_scenario() {
    let harness = TestHarness::new();

    let approve = file_topup(&harness, 500).await;
    let messages = harness.press(ADMIN, &approve).await;
    assert_eq!(to(&messages, BUYER).len(), 1);
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 500.00 ₽");

    let order = place_order(&harness, 100).await;
    harness.press(ADMIN, &order).await;
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 350.00 ₽");

    let order = place_order(&harness, 100).await;
    harness.press(ADMIN, &order).await;
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 200.00 ₽");

    let stats = harness.say(ADMIN, "/stats").await;
    let text = stats[0]["text"].as_str().unwrap();
    assert!(text.contains("500.00 ₽"));
    assert!(text.contains("Продано звёзд: 200"));
}

#[tokio::test]
async fn approval_without_funds_keeps_the_order() {
    let harness = TestHarness::new();
    let approve = file_topup(&harness, 50).await;
    harness.press(ADMIN, &approve).await;

    let order = place_order(&harness, 100).await;
    let messages = harness.press(ADMIN, &order).await;
    assert!(messages[0]["text"].as_str().unwrap().contains("100.00 ₽"));
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 50.00 ₽");

    // Funds arrive later; the same button now works.
    let approve = file_topup(&harness, 100).await;
    harness.press(ADMIN, &approve).await;
    harness.press(ADMIN, &order).await;
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 0.00 ₽");
}

#[tokio::test]
async fn double_click_credits_once() {
    let harness = TestHarness::new();
    let approve = file_topup(&harness, 500).await;

    harness.press(ADMIN, &approve).await;
    let messages = harness.press(ADMIN, &approve).await;

    assert_eq!(messages.len(), 1);
    assert!(messages[0]["text"].as_str().unwrap().contains("уже обработана"));
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 500.00 ₽");
}

#[tokio::test]
async fn non_admin_cannot_approve_even_with_hint() {
    let harness = TestHarness::new();
    let approve = file_topup(&harness, 500).await;

    let messages = harness
        .send(json!({
            "user_id": BUYER,
            "admin_hint": true,
            "type": "button",
            "data": approve
        }))
        .await;

    assert_eq!(to(&messages, BUYER).len(), 1);
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 0.00 ₽");
}

#[tokio::test]
async fn rejected_order_leaves_balance() {
    let harness = TestHarness::new();
    let approve = file_topup(&harness, 500).await;
    harness.press(ADMIN, &approve).await;

    let order = place_order(&harness, 100).await;
    let reject = order.replace("order_ok:", "order_no:");
    let messages = harness.press(ADMIN, &reject).await;

    assert_eq!(to(&messages, BUYER).len(), 1);
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 500.00 ₽");
}

// ============================================================================
// Restart
// ============================================================================

#[tokio::test]
async fn pending_requests_survive_restart() {
    let harness = TestHarness::new();
    let approve = file_topup(&harness, 500).await;
    let order = place_order(&harness, 100).await;

    let harness = harness.restart();

    harness.press(ADMIN, &approve).await;
    harness.press(ADMIN, &order).await;
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 350.00 ₽");
}

// ============================================================================
// Gateway topups
// ============================================================================

#[tokio::test]
async fn gateway_topup_checked_by_button() {
    let harness = TestHarness::new();
    harness.press(BUYER, "topup_amount:1000").await;

    let messages = harness.press(BUYER, "pay_usdt").await;
    let link = &messages[0]["actions"][0];
    assert_eq!(link["type"], "link");
    assert!(link["url"].as_str().unwrap().starts_with("https://"));
    assert_eq!(harness.gateway.requests.lock().unwrap()[0].amount_minor, 100_000);

    let messages = harness.press(BUYER, "check_crypto").await;
    assert!(messages[0]["text"].as_str().unwrap().contains("пока не виден"));

    *harness.gateway.paid.lock().unwrap() = true;
    let messages = harness.press(BUYER, "check_crypto").await;
    assert!(messages[0]["text"].as_str().unwrap().contains("1000.00 ₽"));

    let messages = harness.press(BUYER, "check_crypto").await;
    assert!(messages[0]["text"].as_str().unwrap().contains("Нет ожидающих"));
    assert_eq!(balance_text(&harness).await, "Ваш баланс: 1000.00 ₽");
}
