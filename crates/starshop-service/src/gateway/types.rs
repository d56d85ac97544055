//! Crypto Pay API types.

use serde::{Deserialize, Deserializer, Serialize};
use starshop_core::{decimal_to_minor, format_minor, parse_major, RequestCode, UserId};

/// Response envelope of every Crypto Pay method.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Method result.
    pub result: Option<T>,
    /// Error description when `ok` is false.
    pub error: Option<serde_json::Value>,
}

/// Crypto Pay invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    /// Invoice ID.
    pub invoice_id: i64,
    /// `active`, `paid` or `expired`.
    #[serde(default)]
    pub status: String,
    /// Amount in the invoice currency.
    #[serde(default)]
    pub amount: Option<String>,
    /// Link that opens the invoice in the Crypto Bot mini app.
    #[serde(default)]
    pub mini_app_invoice_url: Option<String>,
    /// Link that opens the invoice in the Crypto Bot chat.
    #[serde(default)]
    pub bot_invoice_url: Option<String>,
    /// Deprecated alias of `bot_invoice_url`.
    #[serde(default)]
    pub pay_url: Option<String>,
    /// Payload attached on creation; a JSON string in practice.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl InvoiceObject {
    /// The best link to show the payer, if any.
    #[must_use]
    pub fn payment_url(&self) -> Option<&str> {
        self.mini_app_invoice_url
            .as_deref()
            .or(self.bot_invoice_url.as_deref())
            .or(self.pay_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Decode the topup payload, whether it came back as a string or object.
    #[must_use]
    pub fn topup_payload(&self) -> Option<TopupPayload> {
        let payload: TopupPayload = match self.payload.as_ref()? {
            serde_json::Value::String(raw) => serde_json::from_str(raw).ok()?,
            other => serde_json::from_value(other.clone()).ok()?,
        };
        Some(payload).filter(|p| p.kind == TopupPayload::KIND)
    }
}

/// `getInvoices` returns either a bare list or `{items: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InvoiceList {
    /// Bare list.
    Bare(Vec<InvoiceObject>),
    /// Wrapped list.
    Items {
        /// The invoices.
        items: Vec<InvoiceObject>,
    },
}

impl InvoiceList {
    /// The invoices, whatever the shape.
    #[must_use]
    pub fn into_items(self) -> Vec<InvoiceObject> {
        match self {
            Self::Bare(items) | Self::Items { items } => items,
        }
    }
}

/// Data embedded in a topup invoice so a paid invoice can be traced back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopupPayload {
    /// Always `topup`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The paying user.
    pub user_id: UserId,
    /// Code of the pending topup.
    pub topup_id: RequestCode,
    /// Amount in rubles (`500.00`).
    #[serde(deserialize_with = "string_or_number")]
    pub amount_rub: String,
}

impl TopupPayload {
    /// Payload type tag.
    pub const KIND: &'static str = "topup";

    /// Payload for a new topup invoice.
    #[must_use]
    pub fn new(user_id: UserId, code: RequestCode, amount_minor: i64) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            user_id,
            topup_id: code,
            amount_rub: format_minor(amount_minor),
        }
    }

    /// Amount in minor units, if the payload carries a valid amount.
    #[must_use]
    pub fn amount_minor(&self) -> Option<i64> {
        parse_major(&self.amount_rub)
            .and_then(decimal_to_minor)
            .ok()
            .filter(|minor| *minor > 0)
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

/// Body of `createInvoice`.
#[derive(Debug, Serialize)]
pub struct CreateInvoiceBody<'a> {
    /// Always `fiat`.
    pub currency_type: &'a str,
    /// Always `RUB`.
    pub fiat: &'a str,
    /// Amount in rubles.
    pub amount: String,
    /// Comma-separated accepted assets.
    pub accepted_assets: &'a str,
    /// Shown to the payer.
    pub description: String,
    /// JSON-encoded [`TopupPayload`].
    pub payload: String,
    /// Payer may stay anonymous.
    pub allow_anonymous: bool,
    /// Payer may not leave a comment.
    pub allow_comments: bool,
    /// Seconds until the invoice expires.
    pub expires_in: u32,
}

/// Webhook update sent by Crypto Pay.
#[derive(Debug, Deserialize)]
pub struct WebhookUpdate {
    /// Update ID.
    pub update_id: i64,
    /// `invoice_paid` is the only type sent today.
    pub update_type: String,
    /// The invoice the update is about.
    pub payload: InvoiceObject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invoice(payload: serde_json::Value) -> InvoiceObject {
        serde_json::from_value(json!({
            "invoice_id": 7,
            "status": "paid",
            "bot_invoice_url": "https://t.me/CryptoBot?start=IV7",
            "pay_url": "https://t.me/CryptoBot?start=old",
            "payload": payload
        }))
        .unwrap()
    }

    #[test]
    fn payment_url_prefers_the_richest_link() {
        let invoice = invoice(json!(null));
        assert_eq!(
            invoice.payment_url(),
            Some("https://t.me/CryptoBot?start=IV7")
        );
    }

    #[test]
    fn payload_decodes_from_string_or_object() {
        let code = RequestCode::generate();
        let encoded = serde_json::to_string(&TopupPayload::new(UserId::new(9), code.clone(), 50_000))
            .unwrap();

        let from_string = invoice(json!(encoded)).topup_payload().unwrap();
        assert_eq!(from_string.topup_id, code);
        assert_eq!(from_string.amount_minor(), Some(50_000));

        let from_object = invoice(json!({
            "type": "topup",
            "user_id": 9,
            "topup_id": code.as_str(),
            "amount_rub": 500
        }))
        .topup_payload()
        .unwrap();
        assert_eq!(from_object.amount_minor(), Some(50_000));
    }

    #[test]
    fn foreign_payloads_are_ignored() {
        assert!(invoice(json!("not json")).topup_payload().is_none());
        assert!(invoice(json!({"type": "donation"})).topup_payload().is_none());
    }

    #[test]
    fn invoice_list_accepts_both_shapes() {
        let bare: InvoiceList = serde_json::from_value(json!([{"invoice_id": 1}])).unwrap();
        assert_eq!(bare.into_items().len(), 1);

        let wrapped: InvoiceList =
            serde_json::from_value(json!({"items": [{"invoice_id": 1}, {"invoice_id": 2}]}))
                .unwrap();
        assert_eq!(wrapped.into_items().len(), 2);
    }

    #[test]
    fn envelope_without_result_is_an_error_reply() {
        let envelope: ApiEnvelope<InvoiceObject> = serde_json::from_value(json!({
            "ok": false,
            "error": {"code": 401, "name": "UNAUTHORIZED"}
        }))
        .unwrap();
        assert!(!envelope.ok);
        assert!(envelope.result.is_none());
        assert_eq!(envelope.error.unwrap()["name"], "UNAUTHORIZED");
    }
}
