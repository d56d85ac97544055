//! Automatic star delivery through an external executor.
//!
//! The executor drives the storefront and answers with either a confirmation
//! or a payment link the user must follow to complete the order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Error type for fulfillment operations.
#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    /// HTTP request failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The executor reported a failure.
    #[error("fulfillment failed: {0}")]
    Rejected(String),

    /// The executor answered with something we cannot use.
    #[error("unexpected executor response: {0}")]
    InvalidResponse(String),
}

/// What the executor achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Stars were delivered.
    Confirmed {
        /// Storefront order reference.
        confirmation: String,
    },
    /// The storefront wants a payment before it delivers.
    PaymentLink {
        /// Link for the user.
        url: String,
    },
}

/// Delivers stars to a recipient.
#[async_trait]
pub trait FulfillmentExecutor: Send + Sync {
    /// Deliver `quantity` stars to `recipient` (`@handle` or numeric id).
    async fn fulfill(
        &self,
        recipient: &str,
        quantity: u32,
    ) -> Result<FulfillmentOutcome, FulfillmentError>;
}

#[derive(Debug, Serialize)]
struct FulfillRequest<'a> {
    recipient: &'a str,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FulfillResponse {
    Link { payment_link: String },
    Confirmed { confirmation: String },
    Failed { error: String },
    Legacy(String),
}

/// Prefix of the plain-string payment link form.
const LEGACY_LINK_PREFIX: &str = "PAYMENT_LINK::";

/// Browser automation is slow; allow ten minutes per order.
pub const EXECUTOR_TIMEOUT: Duration = Duration::from_secs(600);

/// Executor reached over HTTP at `{base_url}/fulfill`.
#[derive(Debug, Clone)]
pub struct HttpFulfillmentExecutor {
    client: Client,
    base_url: String,
}

impl HttpFulfillmentExecutor {
    /// Create a new executor client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, FulfillmentError> {
        let client = Client::builder().timeout(EXECUTOR_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FulfillmentExecutor for HttpFulfillmentExecutor {
    async fn fulfill(
        &self,
        recipient: &str,
        quantity: u32,
    ) -> Result<FulfillmentOutcome, FulfillmentError> {
        let response = self
            .client
            .post(format!("{}/fulfill", self.base_url))
            .json(&FulfillRequest {
                recipient,
                quantity,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FulfillmentError::Rejected(format!("HTTP {status}: {body}")));
        }

        let parsed: FulfillResponse = response
            .json()
            .await
            .map_err(|e| FulfillmentError::InvalidResponse(e.to_string()))?;
        interpret(parsed)
    }
}

fn interpret(response: FulfillResponse) -> Result<FulfillmentOutcome, FulfillmentError> {
    match response {
        FulfillResponse::Link { payment_link } => payment_link_outcome(payment_link),
        FulfillResponse::Confirmed { confirmation } => {
            Ok(FulfillmentOutcome::Confirmed { confirmation })
        }
        FulfillResponse::Failed { error } => Err(FulfillmentError::Rejected(error)),
        FulfillResponse::Legacy(text) => match text.strip_prefix(LEGACY_LINK_PREFIX) {
            Some(url) => payment_link_outcome(url.to_string()),
            None if !text.trim().is_empty() => Ok(FulfillmentOutcome::Confirmed { confirmation: text }),
            None => Err(FulfillmentError::InvalidResponse("empty confirmation".into())),
        },
    }
}

fn payment_link_outcome(url: String) -> Result<FulfillmentOutcome, FulfillmentError> {
    if url.starts_with("http") {
        Ok(FulfillmentOutcome::PaymentLink { url })
    } else {
        Err(FulfillmentError::InvalidResponse(format!(
            "payment link is not a URL: {url}"
        )))
    }
}
