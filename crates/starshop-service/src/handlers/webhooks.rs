//! Crypto Pay webhook handler.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::bot::invoice_paid_notice;
use crate::error::ApiError;
use crate::gateway::types::WebhookUpdate;
use crate::gateway::verify_webhook_signature;
use crate::state::AppState;

/// Header carrying the body signature.
const SIGNATURE_HEADER: &str = "crypto-pay-api-signature";

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle Crypto Pay webhooks.
///
/// Only signed `invoice_paid` updates carrying one of our topup payloads
/// move money; everything else is acknowledged and ignored.
pub async fn cryptopay_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let token = state
        .config
        .cryptopay_api_token
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("Crypto Pay is not configured".into()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("Missing Crypto Pay signature".into()))?;

    if !verify_webhook_signature(token, &body, signature) {
        tracing::warn!("Invalid Crypto Pay webhook signature");
        return Err(ApiError::BadRequest("Invalid webhook signature".into()));
    }

    let update: WebhookUpdate =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        update_id = update.update_id,
        update_type = %update.update_type,
        invoice_id = update.payload.invoice_id,
        "Received Crypto Pay webhook"
    );

    if update.update_type != "invoice_paid" {
        tracing::debug!(update_type = %update.update_type, "Unhandled Crypto Pay update");
        return Ok(Json(WebhookResponse { received: true }));
    }

    let Some(payload) = update.payload.topup_payload() else {
        tracing::debug!(invoice_id = update.payload.invoice_id, "Paid invoice is not a topup");
        return Ok(Json(WebhookResponse { received: true }));
    };
    let amount_minor = payload
        .amount_minor()
        .ok_or_else(|| ApiError::BadRequest("Topup payload without a valid amount".into()))?;

    let credit = state
        .desk
        .settle_paid_invoice(payload.user_id, &payload.topup_id, amount_minor)
        .await?;

    match credit {
        Some(credit) => {
            tracing::info!(
                user_id = %payload.user_id,
                code = %payload.topup_id,
                amount_minor = credit.amount_minor,
                "Topup credited from webhook"
            );
            state
                .outbox
                .push(invoice_paid_notice(payload.user_id, &credit));
        }
        None => {
            tracing::debug!(code = %payload.topup_id, "Webhook for an already credited topup");
        }
    }

    Ok(Json(WebhookResponse { received: true }))
}
