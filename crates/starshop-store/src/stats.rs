//! Lifetime deposit and delivery counters.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use starshop_core::{LifetimeStats, RequestCode, StatsSummary, UserId};
use tracing::debug;

use crate::document::{load_document, save_document, DocumentStore};
use crate::schema::doc;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatsDocument {
    #[serde(default)]
    users: BTreeMap<UserId, LifetimeStats>,
    /// `deposit:<code>` and `goods:<code>` markers already counted.
    #[serde(default)]
    applied: BTreeSet<String>,
}

/// Monotonic counters per user. Each reference is counted at most once.
pub struct StatsBook {
    store: Arc<dyn DocumentStore>,
    document: StatsDocument,
}

impl StatsBook {
    /// Load the stats document.
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>) -> Self {
        let document = load_document(store.as_ref(), doc::STATS).unwrap_or_default();
        Self { store, document }
    }

    /// Counters for one user; zeros if nothing was recorded.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> LifetimeStats {
        self.document.users.get(&user_id).copied().unwrap_or_default()
    }

    /// Totals across all users.
    #[must_use]
    pub fn summary(&self) -> StatsSummary {
        self.document.users.values().collect()
    }

    /// Whether the deposit settling `reference` was counted.
    #[must_use]
    pub fn has_deposit(&self, reference: &RequestCode) -> bool {
        self.document.applied.contains(&deposit_key(reference))
    }

    /// Whether the delivery for order `reference` was counted.
    #[must_use]
    pub fn has_goods(&self, reference: &RequestCode) -> bool {
        self.document.applied.contains(&goods_key(reference))
    }

    /// Count a confirmed deposit. Returns `false` if it was counted before.
    pub fn record_deposit(&mut self, user_id: UserId, amount_minor: i64, reference: &RequestCode) -> bool {
        if !self.document.applied.insert(deposit_key(reference)) {
            return false;
        }
        let stats = self.document.users.entry(user_id).or_default();
        stats.total_deposited_minor = stats.total_deposited_minor.saturating_add(amount_minor);

        debug!(user_id = %user_id, amount_minor, "Deposit recorded in stats");
        self.persist();
        true
    }

    /// Count delivered stars. Returns `false` if the order was counted before.
    pub fn record_goods(&mut self, user_id: UserId, units: u32, reference: &RequestCode) -> bool {
        if !self.document.applied.insert(goods_key(reference)) {
            return false;
        }
        let stats = self.document.users.entry(user_id).or_default();
        stats.total_goods_units = stats.total_goods_units.saturating_add(u64::from(units));

        debug!(user_id = %user_id, units, "Delivery recorded in stats");
        self.persist();
        true
    }

    fn persist(&self) -> bool {
        save_document(self.store.as_ref(), doc::STATS, &self.document)
    }
}

fn deposit_key(reference: &RequestCode) -> String {
    format!("deposit:{reference}")
}

fn goods_key(reference: &RequestCode) -> String {
    format!("goods:{reference}")
}
