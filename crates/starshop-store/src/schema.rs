//! Document names.

/// Names of the persisted documents.
pub mod doc {
    /// Balances per user and the ledger journal.
    pub const BALANCES: &str = "balances";

    /// Lifetime statistics per user, plus the references already counted.
    pub const STATS: &str = "stats";

    /// Pending manual-transfer topups, keyed by request code.
    pub const MANUAL_TOPUPS: &str = "manual_topups";

    /// Pending purchase orders, keyed by order code.
    pub const ORDERS: &str = "orders";

    /// Unit price and unit cost.
    pub const SETTINGS: &str = "settings";
}

/// Returns all document names, in the order `Books` writes them.
#[must_use]
pub fn all_documents() -> Vec<&'static str> {
    vec![
        doc::BALANCES,
        doc::STATS,
        doc::MANUAL_TOPUPS,
        doc::ORDERS,
        doc::SETTINGS,
    ]
}
