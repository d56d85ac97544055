//! Ledger entry types for starshop.
//!
//! Every change to a user's balance is journaled as a `LedgerEntry` that names
//! the request or order it settles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, RequestCode, UserId};

/// A journaled balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Amount in minor units. Positive = credit, negative = debit.
    /// For `Restore` this is the difference to the previous balance.
    pub amount_minor: i64,

    /// Type of entry.
    pub kind: EntryKind,

    /// The topup request or order this entry settles.
    pub reference: Option<RequestCode>,

    /// Balance after this entry (in minor units).
    pub balance_after_minor: i64,

    /// Stars delivered together with this purchase, when delivery was
    /// confirmed in the same step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goods_units: Option<u32>,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a deposit entry for a confirmed topup.
    #[must_use]
    pub fn deposit(
        user_id: UserId,
        amount_minor: i64,
        balance_after_minor: i64,
        reference: RequestCode,
    ) -> Self {
        Self::new(
            user_id,
            amount_minor,
            EntryKind::Deposit,
            Some(reference),
            balance_after_minor,
        )
    }

    /// Create a purchase entry (debit). The amount is stored negative.
    #[must_use]
    pub fn purchase(
        user_id: UserId,
        amount_minor: i64,
        balance_after_minor: i64,
        reference: RequestCode,
    ) -> Self {
        Self::new(
            user_id,
            -amount_minor.abs(),
            EntryKind::Purchase,
            Some(reference),
            balance_after_minor,
        )
    }

    /// Create a compensating refund for a failed fulfillment.
    #[must_use]
    pub fn refund(
        user_id: UserId,
        amount_minor: i64,
        balance_after_minor: i64,
        reference: RequestCode,
    ) -> Self {
        Self::new(
            user_id,
            amount_minor,
            EntryKind::Refund,
            Some(reference),
            balance_after_minor,
        )
    }

    /// Create a restore entry that overwrote a balance from a backup.
    #[must_use]
    pub fn restore(user_id: UserId, previous_minor: i64, restored_minor: i64) -> Self {
        Self::new(
            user_id,
            restored_minor - previous_minor,
            EntryKind::Restore,
            None,
            restored_minor,
        )
    }

    /// Mark the purchase as delivered together with the debit.
    #[must_use]
    pub fn with_goods(mut self, units: u32) -> Self {
        self.goods_units = Some(units);
        self
    }

    fn new(
        user_id: UserId,
        amount_minor: i64,
        kind: EntryKind,
        reference: Option<RequestCode>,
        balance_after_minor: i64,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            user_id,
            amount_minor,
            kind,
            reference,
            balance_after_minor,
            goods_units: None,
            created_at: Utc::now(),
        }
    }
}

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Confirmed topup through any rail.
    Deposit,

    /// Balance spent on an order.
    Purchase,

    /// Compensation for a failed automatic fulfillment.
    Refund,

    /// Admin overwrite from a backup.
    Restore,
}

impl EntryKind {
    /// Check if this entry type adds to the balance.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Deposit | Self::Refund)
    }

    /// Check if this entry type removes from the balance.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::Purchase)
    }
}
