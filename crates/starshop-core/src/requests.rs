//! Pending topup requests and purchase orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{RequestCode, UserId};

/// Crypto asset accepted for a gateway invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayAsset {
    /// Toncoin.
    Ton,
    /// Tether.
    Usdt,
}

impl GatewayAsset {
    /// Ticker as the gateway expects it.
    #[must_use]
    pub const fn ticker(self) -> &'static str {
        match self {
            Self::Ton => "TON",
            Self::Usdt => "USDT",
        }
    }
}

impl fmt::Display for GatewayAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

/// An outstanding topup through the payment gateway.
///
/// Kept in memory only; the gateway is the source of truth for payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTopup {
    /// Code embedded in the invoice payload.
    pub code: RequestCode,

    /// The user topping up.
    pub user_id: UserId,

    /// Amount to credit, in minor units.
    pub amount_minor: i64,

    /// Asset accepted by the invoice.
    pub asset: GatewayAsset,

    /// Gateway invoice id, once created.
    pub invoice_ref: Option<String>,

    /// When the request was opened.
    pub created_at: DateTime<Utc>,
}

/// A manual bank-transfer topup awaiting admin confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualTopup {
    /// Unique request code.
    pub code: RequestCode,

    /// The user topping up.
    pub user_id: UserId,

    /// Amount to credit on approval, in minor units.
    pub amount_minor: i64,

    /// Amount the user originally declared, if an admin amended it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_minor: Option<i64>,

    /// When the request was created.
    pub created_at: DateTime<Utc>,

    /// When an admin last amended the amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amended_at: Option<DateTime<Utc>>,
}

impl ManualTopup {
    /// Create a pending request.
    #[must_use]
    pub fn new(code: RequestCode, user_id: UserId, amount_minor: i64) -> Self {
        Self {
            code,
            user_id,
            amount_minor,
            declared_minor: None,
            created_at: Utc::now(),
            amended_at: None,
        }
    }

    /// Replace the amount, remembering what the user declared.
    pub fn amend(&mut self, amount_minor: i64) {
        if self.declared_minor.is_none() {
            self.declared_minor = Some(self.amount_minor);
        }
        self.amount_minor = amount_minor;
        self.amended_at = Some(Utc::now());
    }
}

/// A star order awaiting fulfillment.
///
/// The price is frozen when the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    /// Unique order code.
    pub code: RequestCode,

    /// The paying user.
    pub user_id: UserId,

    /// Number of stars.
    pub quantity: u32,

    /// Quoted price, in minor units.
    pub price_minor: i64,

    /// Account that receives the stars (`@handle` or numeric id).
    pub recipient: String,

    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

impl PurchaseOrder {
    /// Create a pending order.
    #[must_use]
    pub fn new(
        code: RequestCode,
        user_id: UserId,
        quantity: u32,
        price_minor: i64,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            code,
            user_id,
            quantity,
            price_minor,
            recipient: recipient.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amend_keeps_the_first_declared_amount() {
        let mut topup = ManualTopup::new(RequestCode::generate(), UserId::new(7), 50_000);
        topup.amend(45_000);
        topup.amend(40_000);

        assert_eq!(topup.amount_minor, 40_000);
        assert_eq!(topup.declared_minor, Some(50_000));
        assert!(topup.amended_at.is_some());
    }

    #[test]
    fn asset_serializes_as_ticker() {
        assert_eq!(serde_json::to_string(&GatewayAsset::Usdt).unwrap(), r#""USDT""#);
        assert_eq!(GatewayAsset::Ton.to_string(), "TON");
    }
}
