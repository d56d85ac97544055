//! Common test utilities for starshop integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use starshop_core::UserId;
use starshop_service::gateway::{
    GatewayError, Invoice, InvoiceFilter, InvoiceRequest, PaymentGateway,
};
use starshop_service::{create_router, AppState, Collaborators, ServiceConfig};
use starshop_store::FileStore;

/// Admin configured for every harness.
pub const ADMIN: UserId = UserId::new(1);

/// A regular user.
pub const BUYER: UserId = UserId::new(1001);

/// Crypto Pay token configured for every harness.
pub const CRYPTOPAY_TOKEN: &str = "test-cryptopay-token";

/// Gateway that records invoices and reports them paid on demand.
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<InvoiceRequest>>,
    pub paid: Mutex<bool>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(Invoice {
            invoice_id: 500,
            url: Some(format!("https://t.me/CryptoBot?start={}", request.code)),
            payload: None,
        })
    }

    async fn find_paid_invoice(
        &self,
        _filter: &InvoiceFilter,
    ) -> Result<Option<Invoice>, GatewayError> {
        let paid = *self.paid.lock().unwrap();
        Ok(paid.then(|| Invoice {
            invoice_id: 500,
            url: None,
            payload: None,
        }))
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary data directory (kept alive for test duration).
    pub temp_dir: TempDir,
    /// The service API key for front-end requests.
    pub service_api_key: String,
    /// The fake gateway wired into the desk.
    pub gateway: Arc<FakeGateway>,
}

impl TestHarness {
    /// Create a new test harness with a fresh data directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self::open(temp_dir)
    }

    /// Start a service over an existing data directory, as after a restart.
    pub fn open(temp_dir: TempDir) -> Self {
        let store = FileStore::open(temp_dir.path()).expect("Failed to open store");
        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            bot_token: "test-bot-token".into(),
            admin_ids: BTreeSet::from([ADMIN]),
            cryptopay_api_token: Some(CRYPTOPAY_TOKEN.into()),
            service_api_key: Some(service_api_key.clone()),
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            ..ServiceConfig::default()
        };

        let gateway = Arc::new(FakeGateway::default());
        let collaborators = Collaborators {
            gateway: Some(gateway.clone()),
            ..Collaborators::default()
        };

        let state = AppState::new(Arc::new(store), config, collaborators);
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            temp_dir,
            service_api_key,
            gateway,
        }
    }

    /// Stop the service and start a fresh one over the same data.
    pub fn restart(self) -> Self {
        Self::open(self.temp_dir)
    }

    /// Post an event and return the messages.
    pub async fn send(&self, event: Value) -> Vec<Value> {
        let response = self
            .server
            .post("/v1/events")
            .add_header("x-api-key", &self.service_api_key)
            .add_header("x-service-name", "telegram-frontend")
            .json(&event)
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["messages"].as_array().cloned().unwrap_or_default()
    }

    /// Press a button as `user_id`.
    pub async fn press(&self, user_id: UserId, data: &str) -> Vec<Value> {
        self.send(json!({
            "user_id": user_id,
            "username": "buyer",
            "type": "button",
            "data": data
        }))
        .await
    }

    /// Type text as `user_id`.
    pub async fn say(&self, user_id: UserId, text: &str) -> Vec<Value> {
        self.send(json!({"user_id": user_id, "type": "text", "text": text}))
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Messages addressed to `user_id`.
pub fn to(messages: &[Value], user_id: UserId) -> Vec<Value> {
    messages
        .iter()
        .filter(|m| m["user_id"] == json!(user_id))
        .cloned()
        .collect()
}

/// Callback data of the first button whose data starts with `prefix`.
pub fn button(message: &Value, prefix: &str) -> String {
    message["actions"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|action| action["data"].as_str())
        .find(|data| data.starts_with(prefix))
        .expect("no such button")
        .to_string()
}
