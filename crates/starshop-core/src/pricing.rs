//! Pricing and money helpers for starshop.
//!
//! Unit prices are configured in major units (RUB per star) as decimals and
//! quoted into integer minor units by flooring to the kopeck.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Minor units per major unit (kopecks per ruble).
pub const MINOR_PER_MAJOR: i64 = 100;

/// Unit price and unit cost of one star.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    /// Price charged to the user per star, in major units.
    pub unit_price: Decimal,

    /// Our own cost per star, in major units.
    pub unit_cost: Decimal,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            unit_price: Decimal::new(150, 2),
            unit_cost: Decimal::new(145, 2),
        }
    }
}

impl Pricing {
    /// Price of `quantity` stars in minor units, floored to the kopeck.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidAmount` if the price is negative or does
    /// not fit in an `i64`.
    pub fn quote(&self, quantity: u32) -> Result<i64> {
        let total = self
            .unit_price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| BillingError::InvalidAmount(format!("{quantity} stars out of range")))?;
        decimal_to_minor(total)
    }

    /// Estimated margin over `goods` delivered stars at the current settings.
    #[must_use]
    pub fn margin_minor(&self, goods: u64) -> i64 {
        let margin = (self.unit_price - self.unit_cost) * Decimal::from(goods);
        (margin * Decimal::from(MINOR_PER_MAJOR))
            .floor()
            .to_i64()
            .unwrap_or(0)
    }
}

/// Convert a major-unit decimal into floored minor units.
///
/// # Errors
///
/// Returns `BillingError::InvalidAmount` for negative or out-of-range values.
pub fn decimal_to_minor(major: Decimal) -> Result<i64> {
    if major.is_sign_negative() {
        return Err(BillingError::InvalidAmount(format!("negative amount {major}")));
    }
    major
        .checked_mul(Decimal::from(MINOR_PER_MAJOR))
        .and_then(|minor| minor.floor().to_i64())
        .ok_or_else(|| BillingError::InvalidAmount(format!("amount {major} out of range")))
}

/// Quantity and topup bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Smallest star quantity per order.
    pub min_quantity: u32,

    /// Largest star quantity per order.
    pub max_quantity: u32,

    /// Smallest custom topup, in major units.
    pub min_topup_major: i64,

    /// Largest custom topup, in major units.
    pub max_topup_major: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_quantity: 1,
            max_quantity: 5000,
            min_topup_major: 10,
            max_topup_major: 100_000,
        }
    }
}

impl Limits {
    /// Ensure a quantity is within bounds.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidQuantity` otherwise.
    pub fn check_quantity(&self, quantity: u32) -> Result<()> {
        if (self.min_quantity..=self.max_quantity).contains(&quantity) {
            Ok(())
        } else {
            Err(BillingError::InvalidQuantity {
                quantity,
                min: self.min_quantity,
                max: self.max_quantity,
            })
        }
    }

    /// Clamp free-form user input into the allowed quantity range.
    #[must_use]
    pub fn clamp_quantity(&self, raw: u64) -> u32 {
        let raw = u32::try_from(raw).unwrap_or(u32::MAX);
        raw.clamp(self.min_quantity, self.max_quantity)
    }

    /// Whether a custom topup amount (major units) is allowed.
    #[must_use]
    pub fn topup_allowed(&self, major: i64) -> bool {
        (self.min_topup_major..=self.max_topup_major).contains(&major)
    }
}

/// Convert whole major units into minor units.
///
/// # Errors
///
/// Returns `BillingError::InvalidAmount` for non-positive or overflowing amounts.
pub fn major_to_minor(major: i64) -> Result<i64> {
    if major <= 0 {
        return Err(BillingError::InvalidAmount(format!("{major} must be positive")));
    }
    major
        .checked_mul(MINOR_PER_MAJOR)
        .ok_or_else(|| BillingError::InvalidAmount(format!("{major} out of range")))
}

/// Parse a major-unit decimal typed by an admin (`3.50` or `3,50`).
///
/// # Errors
///
/// Returns `BillingError::InvalidAmount` if the text is not a non-negative decimal.
pub fn parse_major(text: &str) -> Result<Decimal> {
    let normalized = text.trim().replace(',', ".");
    let value: Decimal = normalized
        .parse()
        .map_err(|_| BillingError::InvalidAmount(format!("not a number: {text}")))?;
    if value.is_sign_negative() {
        return Err(BillingError::InvalidAmount(format!("negative amount: {text}")));
    }
    Ok(value)
}

/// Render minor units as a major-unit string with two decimals (`150.00`).
#[must_use]
pub fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let per = MINOR_PER_MAJOR.unsigned_abs();
    format!("{sign}{}.{:02}", abs / per, abs % per)
}
