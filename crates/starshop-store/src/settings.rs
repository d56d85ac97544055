//! Admin-adjustable pricing.

use std::sync::Arc;

use rust_decimal::Decimal;
use starshop_core::Pricing;
use tracing::info;

use crate::document::{load_document, save_document, DocumentStore};
use crate::schema::doc;

/// Current unit price and unit cost.
///
/// Falls back to the configured defaults until an admin changes a value.
pub struct Settings {
    store: Arc<dyn DocumentStore>,
    pricing: Pricing,
}

impl Settings {
    /// Load stored pricing, or use `defaults`.
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>, defaults: Pricing) -> Self {
        let pricing = load_document(store.as_ref(), doc::SETTINGS).unwrap_or(defaults);
        Self { store, pricing }
    }

    /// Current pricing.
    #[must_use]
    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    /// Change the unit price charged to users. Existing orders keep theirs.
    pub fn set_unit_price(&mut self, unit_price: Decimal) {
        info!(old = %self.pricing.unit_price, new = %unit_price, "Unit price changed");
        self.pricing.unit_price = unit_price;
        self.persist();
    }

    /// Change our own cost per star.
    pub fn set_unit_cost(&mut self, unit_cost: Decimal) {
        info!(old = %self.pricing.unit_cost, new = %unit_cost, "Unit cost changed");
        self.pricing.unit_cost = unit_cost;
        self.persist();
    }

    fn persist(&self) -> bool {
        save_document(self.store.as_ref(), doc::SETTINGS, &self.pricing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryStore;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_until_changed() {
        let store = Arc::new(MemoryStore::new());
        let mut settings = Settings::open(store.clone(), Pricing::default());
        assert_eq!(settings.pricing().unit_price, dec!(1.50));

        settings.set_unit_price(dec!(1.70));
        settings.set_unit_cost(dec!(1.40));

        let reopened = Settings::open(store, Pricing::default());
        assert_eq!(reopened.pricing().unit_price, dec!(1.70));
        assert_eq!(reopened.pricing().unit_cost, dec!(1.40));
    }
}
