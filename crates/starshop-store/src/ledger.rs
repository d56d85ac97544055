//! Balances and the journal of every balance change.
//!
//! Balances and journal share one document so a balance change and the entry
//! explaining it are committed by the same write. The `(kind, reference)` pair
//! of an entry is unique, which makes settling the same request twice a no-op.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use starshop_core::{BillingError, EntryKind, LedgerEntry, RequestCode, Result, UserId};
use tracing::{info, warn};

use crate::document::{load_document, save_document, DocumentStore};
use crate::schema::doc;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    balances: BTreeMap<UserId, i64>,
    #[serde(default)]
    journal: Vec<LedgerEntry>,
}

/// Outcome of [`Ledger::debit_if_sufficient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debit {
    /// The amount was taken.
    Applied {
        /// Balance after the debit.
        balance_minor: i64,
    },
    /// The balance does not cover the amount; nothing changed.
    Insufficient {
        /// How much is missing.
        shortfall_minor: i64,
    },
}

/// Outcome of [`Ledger::refund`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refund {
    /// The amount was returned.
    Applied {
        /// Balance after the refund.
        balance_minor: i64,
    },
    /// This order was refunded before.
    AlreadyRefunded,
}

/// Balances per user, never negative.
pub struct Ledger {
    store: Arc<dyn DocumentStore>,
    balances: BTreeMap<UserId, i64>,
    journal: Vec<LedgerEntry>,
    settled: HashSet<(EntryKind, RequestCode)>,
}

impl Ledger {
    /// Load the ledger document.
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>) -> Self {
        let document: LedgerDocument = load_document(store.as_ref(), doc::BALANCES).unwrap_or_default();

        for (user_id, balance) in &document.balances {
            if *balance < 0 {
                warn!(user_id = %user_id, balance, "Negative balance in stored ledger");
            }
        }

        let settled = document
            .journal
            .iter()
            .filter_map(|entry| entry.reference.clone().map(|code| (entry.kind, code)))
            .collect();

        Self {
            store,
            balances: document.balances,
            journal: document.journal,
            settled,
        }
    }

    /// Current balance; zero for unknown users.
    #[must_use]
    pub fn balance(&self, user_id: UserId) -> i64 {
        self.balances.get(&user_id).copied().unwrap_or(0)
    }

    /// Whether an entry of this kind already settles `reference`.
    #[must_use]
    pub fn is_settled(&self, kind: EntryKind, reference: &RequestCode) -> bool {
        self.settled.contains(&(kind, reference.clone()))
    }

    /// The full journal, oldest first.
    #[must_use]
    pub fn journal(&self) -> &[LedgerEntry] {
        &self.journal
    }

    /// Journal entries of one user, oldest first.
    pub fn entries_for(&self, user_id: UserId) -> impl Iterator<Item = &LedgerEntry> {
        self.journal.iter().filter(move |entry| entry.user_id == user_id)
    }

    /// Credit a confirmed topup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts or overflow, and
    /// `AlreadySettled` if `reference` was credited before.
    pub fn credit(&mut self, user_id: UserId, amount_minor: i64, reference: RequestCode) -> Result<i64> {
        self.ensure_unsettled(EntryKind::Deposit, &reference)?;
        let balance = self.checked_add(user_id, amount_minor)?;
        self.commit(user_id, balance, LedgerEntry::deposit(user_id, amount_minor, balance, reference));

        info!(user_id = %user_id, amount_minor, balance, "Balance credited");
        Ok(balance)
    }

    /// Take `amount_minor` if the balance covers it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts and `AlreadySettled`
    /// if `reference` was debited before.
    pub fn debit_if_sufficient(
        &mut self,
        user_id: UserId,
        amount_minor: i64,
        reference: RequestCode,
    ) -> Result<Debit> {
        self.debit(user_id, amount_minor, reference, None)
    }

    /// Like [`Ledger::debit_if_sufficient`], recording that `units` stars were
    /// delivered with the debit.
    ///
    /// # Errors
    ///
    /// Same as [`Ledger::debit_if_sufficient`].
    pub fn debit_delivered(
        &mut self,
        user_id: UserId,
        amount_minor: i64,
        reference: RequestCode,
        units: u32,
    ) -> Result<Debit> {
        self.debit(user_id, amount_minor, reference, Some(units))
    }

    /// Return the price of a failed order. Refunding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts or overflow.
    pub fn refund(&mut self, user_id: UserId, amount_minor: i64, reference: RequestCode) -> Result<Refund> {
        if self.is_settled(EntryKind::Refund, &reference) {
            warn!(user_id = %user_id, reference = %reference, "Refund already applied");
            return Ok(Refund::AlreadyRefunded);
        }
        let balance = self.checked_add(user_id, amount_minor)?;
        self.commit(user_id, balance, LedgerEntry::refund(user_id, amount_minor, balance, reference));

        info!(user_id = %user_id, amount_minor, balance, "Order refunded");
        Ok(Refund::Applied { balance_minor: balance })
    }

    /// Overwrite a balance, e.g. from a backup.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for negative balances.
    pub fn restore(&mut self, user_id: UserId, balance_minor: i64) -> Result<i64> {
        if balance_minor < 0 {
            return Err(BillingError::InvalidAmount(format!(
                "restored balance must not be negative, got {balance_minor}"
            )));
        }
        let previous = self.balance(user_id);
        self.commit(
            user_id,
            balance_minor,
            LedgerEntry::restore(user_id, previous, balance_minor),
        );

        warn!(user_id = %user_id, previous, balance = balance_minor, "Balance restored by admin");
        Ok(previous)
    }

    fn debit(
        &mut self,
        user_id: UserId,
        amount_minor: i64,
        reference: RequestCode,
        units: Option<u32>,
    ) -> Result<Debit> {
        ensure_positive(amount_minor)?;
        self.ensure_unsettled(EntryKind::Purchase, &reference)?;

        let current = self.balance(user_id);
        if current < amount_minor {
            return Ok(Debit::Insufficient {
                shortfall_minor: amount_minor - current,
            });
        }

        let balance = current - amount_minor;
        let mut entry = LedgerEntry::purchase(user_id, amount_minor, balance, reference);
        if let Some(units) = units {
            entry = entry.with_goods(units);
        }
        self.commit(user_id, balance, entry);

        info!(user_id = %user_id, amount_minor, balance, "Balance debited");
        Ok(Debit::Applied { balance_minor: balance })
    }

    fn checked_add(&self, user_id: UserId, amount_minor: i64) -> Result<i64> {
        ensure_positive(amount_minor)?;
        self.balance(user_id)
            .checked_add(amount_minor)
            .ok_or_else(|| BillingError::InvalidAmount("balance overflow".to_string()))
    }

    fn ensure_unsettled(&self, kind: EntryKind, reference: &RequestCode) -> Result<()> {
        if self.is_settled(kind, reference) {
            return Err(BillingError::AlreadySettled {
                reference: reference.to_string(),
            });
        }
        Ok(())
    }

    fn commit(&mut self, user_id: UserId, balance: i64, entry: LedgerEntry) {
        if let Some(code) = entry.reference.clone() {
            self.settled.insert((entry.kind, code));
        }
        self.balances.insert(user_id, balance);
        self.journal.push(entry);
        self.persist();
    }

    fn persist(&self) -> bool {
        #[derive(Serialize)]
        struct View<'a> {
            balances: &'a BTreeMap<UserId, i64>,
            journal: &'a [LedgerEntry],
        }

        save_document(
            self.store.as_ref(),
            doc::BALANCES,
            &View {
                balances: &self.balances,
                journal: &self.journal,
            },
        )
    }
}

fn ensure_positive(amount_minor: i64) -> Result<()> {
    if amount_minor <= 0 {
        return Err(BillingError::InvalidAmount(format!(
            "amount must be positive, got {amount_minor}"
        )));
    }
    Ok(())
}
