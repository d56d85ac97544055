//! Crypto payment gateway.
//!
//! The desk only knows the [`PaymentGateway`] trait; [`CryptoPayClient`] is
//! the implementation against the Crypto Pay API.

mod client;
pub mod types;

use async_trait::async_trait;
use starshop_core::{BillingError, GatewayAsset, RequestCode, UserId};

pub use client::CryptoPayClient;
pub use types::TopupPayload;

use crate::crypto::{constant_time_eq, hmac_sha256_hex, sha256};

/// Error type for payment gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with `ok: false` or a non-success status.
    #[error("Crypto Pay API error: {0}")]
    Api(String),

    /// The gateway answered with something we cannot use.
    #[error("Unexpected Crypto Pay response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for BillingError {
    fn from(err: GatewayError) -> Self {
        BillingError::external("cryptopay", err.to_string())
    }
}

/// A topup invoice to create.
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    /// Code of the pending topup, embedded in the payload.
    pub code: RequestCode,
    /// The paying user.
    pub user_id: UserId,
    /// Amount in minor units.
    pub amount_minor: i64,
    /// Asset the payer must use.
    pub asset: GatewayAsset,
}

/// Which paid invoice to look for.
#[derive(Debug, Clone)]
pub struct InvoiceFilter {
    /// The paying user.
    pub user_id: UserId,
    /// Code of the pending topup.
    pub code: RequestCode,
}

/// An invoice as far as the desk cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    /// Gateway invoice ID.
    pub invoice_id: i64,
    /// Link for the payer.
    pub url: Option<String>,
    /// Decoded topup payload.
    pub payload: Option<TopupPayload>,
}

/// Payment gateway operations used by the desk.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an invoice for a pending topup. The returned invoice always
    /// carries an http(s) payment link.
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError>;

    /// Find a paid invoice whose payload names the same user and code.
    async fn find_paid_invoice(
        &self,
        filter: &InvoiceFilter,
    ) -> Result<Option<Invoice>, GatewayError>;
}

/// Check a webhook body against its `crypto-pay-api-signature` header.
///
/// The HMAC key is the SHA-256 digest of the API token.
#[must_use]
pub fn verify_webhook_signature(api_token: &str, body: &[u8], signature: &str) -> bool {
    let secret = sha256(api_token.as_bytes());
    match hmac_sha256_hex(&secret, body) {
        Ok(expected) => constant_time_eq(&expected, &signature.to_ascii_lowercase()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_signature_uses_hashed_token() {
        let body = br#"{"update_id":1,"update_type":"invoice_paid"}"#;
        let secret = sha256(b"token");
        let signature = hmac_sha256_hex(&secret, body).unwrap();

        assert!(verify_webhook_signature("token", body, &signature));
        assert!(verify_webhook_signature("token", body, &signature.to_uppercase()));
        assert!(!verify_webhook_signature("other", body, &signature));
        assert!(!verify_webhook_signature("token", b"{}", &signature));
    }
}
