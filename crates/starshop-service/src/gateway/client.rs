//! Crypto Pay API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::types::{ApiEnvelope, CreateInvoiceBody, InvoiceList, InvoiceObject, TopupPayload};
use super::{GatewayError, Invoice, InvoiceFilter, InvoiceRequest, PaymentGateway};
use starshop_core::format_minor;

/// Invoices expire after half an hour.
const INVOICE_TTL_SECONDS: u32 = 1800;

/// Crypto Pay API client.
#[derive(Debug, Clone)]
pub struct CryptoPayClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl CryptoPayClient {
    /// Request timeout.
    const TIMEOUT: Duration = Duration::from_secs(20);

    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://pay.crypt.bot/api`
    /// * `api_token` - Crypto Pay app token
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_token: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(Self::TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        })
    }

    /// Unwrap the `{ok, result, error}` envelope.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        let envelope: Result<ApiEnvelope<T>, _> = response.json().await;

        match envelope {
            Ok(ApiEnvelope {
                ok: true,
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(envelope) if !envelope.ok => Err(GatewayError::Api(
                envelope
                    .error
                    .map_or_else(|| format!("HTTP {status}"), |e| e.to_string()),
            )),
            Ok(_) => Err(GatewayError::InvalidResponse("missing result".into())),
            Err(_) if !status.is_success() => Err(GatewayError::Api(format!("HTTP {status}"))),
            Err(e) => Err(GatewayError::InvalidResponse(e.to_string())),
        }
    }
}

#[async_trait]
impl PaymentGateway for CryptoPayClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
        let payload = TopupPayload::new(request.user_id, request.code.clone(), request.amount_minor);
        let amount = format_minor(request.amount_minor);
        let body = CreateInvoiceBody {
            currency_type: "fiat",
            fiat: "RUB",
            description: format!("Пополнение {amount} ₽ для user {}", request.user_id),
            amount,
            accepted_assets: request.asset.ticker(),
            payload: serde_json::to_string(&payload)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?,
            allow_anonymous: true,
            allow_comments: false,
            expires_in: INVOICE_TTL_SECONDS,
        };

        let response = self
            .client
            .post(format!("{}/createInvoice", self.base_url))
            .header("Crypto-Pay-API-Token", &self.api_token)
            .json(&body)
            .send()
            .await?;

        let invoice: InvoiceObject = self.handle_response(response).await?;
        let url = invoice
            .payment_url()
            .filter(|url| url.starts_with("http"))
            .ok_or_else(|| {
                GatewayError::InvalidResponse(format!(
                    "invoice {} has no usable payment link",
                    invoice.invoice_id
                ))
            })?
            .to_string();

        tracing::info!(
            invoice_id = invoice.invoice_id,
            user_id = %request.user_id,
            code = %request.code,
            asset = %request.asset,
            "Crypto Pay invoice created"
        );

        Ok(Invoice {
            invoice_id: invoice.invoice_id,
            url: Some(url),
            payload: Some(payload),
        })
    }

    async fn find_paid_invoice(
        &self,
        filter: &InvoiceFilter,
    ) -> Result<Option<Invoice>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/getInvoices", self.base_url))
            .header("Crypto-Pay-API-Token", &self.api_token)
            .query(&[("status", "paid"), ("fiat", "RUB")])
            .send()
            .await?;

        let invoices: InvoiceList = self.handle_response(response).await?;

        let found = invoices.into_items().into_iter().find_map(|invoice| {
            let payload = invoice.topup_payload()?;
            (payload.topup_id == filter.code && payload.user_id == filter.user_id).then(|| Invoice {
                invoice_id: invoice.invoice_id,
                url: invoice.payment_url().map(str::to_string),
                payload: Some(payload),
            })
        });

        tracing::debug!(
            user_id = %filter.user_id,
            code = %filter.code,
            found = found.is_some(),
            "Checked Crypto Pay for a paid invoice"
        );
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use starshop_core::{GatewayAsset, RequestCode, UserId};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> CryptoPayClient {
        CryptoPayClient::new(&server.uri(), "test-token").unwrap()
    }

    fn request() -> InvoiceRequest {
        InvoiceRequest {
            code: RequestCode::generate(),
            user_id: UserId::new(42),
            amount_minor: 50_000,
            asset: GatewayAsset::Ton,
        }
    }

    #[tokio::test]
    async fn create_invoice_returns_the_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createInvoice"))
            .and(header("Crypto-Pay-API-Token", "test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "invoice_id": 11,
                    "status": "active",
                    "mini_app_invoice_url": "https://t.me/CryptoBot/app?startapp=IV11"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let invoice = client(&server).await.create_invoice(&request()).await.unwrap();
        assert_eq!(invoice.invoice_id, 11);
        assert_eq!(
            invoice.url.as_deref(),
            Some("https://t.me/CryptoBot/app?startapp=IV11")
        );
    }

    #[tokio::test]
    async fn create_invoice_without_http_link_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createInvoice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"invoice_id": 12, "bot_invoice_url": "tg://resolve?domain=CryptoBot"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.create_invoice(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn api_errors_are_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createInvoice"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error": {"code": 400, "name": "AMOUNT_TOO_SMALL"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.create_invoice(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Api(msg) if msg.contains("AMOUNT_TOO_SMALL")));
    }

    #[tokio::test]
    async fn find_paid_invoice_matches_code_and_user() {
        let server = MockServer::start().await;
        let wanted = request();
        let other_user = TopupPayload::new(UserId::new(7), wanted.code.clone(), 50_000);
        let mine = TopupPayload::new(wanted.user_id, wanted.code.clone(), 50_000);

        Mock::given(method("GET"))
            .and(path("/getInvoices"))
            .and(query_param("status", "paid"))
            .and(query_param("fiat", "RUB"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {"items": [
                    {"invoice_id": 1, "status": "paid", "payload": "garbage"},
                    {"invoice_id": 2, "status": "paid", "payload": serde_json::to_string(&other_user).unwrap()},
                    {"invoice_id": 3, "status": "paid", "payload": serde_json::to_string(&mine).unwrap()}
                ]}
            })))
            .mount(&server)
            .await;

        let filter = InvoiceFilter {
            user_id: wanted.user_id,
            code: wanted.code,
        };
        let found = client(&server).await.find_paid_invoice(&filter).await.unwrap();
        assert_eq!(found.unwrap().invoice_id, 3);
    }

    #[tokio::test]
    async fn find_paid_invoice_accepts_bare_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getInvoices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": []})))
            .mount(&server)
            .await;

        let filter = InvoiceFilter {
            user_id: UserId::new(1),
            code: RequestCode::generate(),
        };
        assert!(client(&server).await.find_paid_invoice(&filter).await.unwrap().is_none());
    }
}
