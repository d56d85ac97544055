//! Pending purchase orders.

use std::collections::BTreeMap;
use std::sync::Arc;

use starshop_core::{BillingError, CodeBook, CodeKind, PurchaseOrder, RequestCode, Result, UserId};
use tracing::{debug, info};

use crate::document::{load_document, save_document, DocumentStore};
use crate::schema::doc;

/// Orders awaiting admin fulfillment, keyed by code.
pub struct OrderTracker {
    store: Arc<dyn DocumentStore>,
    orders: BTreeMap<RequestCode, PurchaseOrder>,
    codes: CodeBook,
}

impl OrderTracker {
    /// Load pending orders and seed the code book with their codes.
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>) -> Self {
        let orders: BTreeMap<RequestCode, PurchaseOrder> =
            load_document(store.as_ref(), doc::ORDERS).unwrap_or_default();

        let mut codes = CodeBook::new(CodeKind::Order);
        codes.extend(orders.keys().cloned());

        Self { store, orders, codes }
    }

    /// Mark codes found elsewhere (e.g. the journal) as used.
    pub fn seed_codes<I: IntoIterator<Item = RequestCode>>(&mut self, codes: I) {
        self.codes.extend(codes);
        debug!(kind = ?self.codes.kind(), known = self.codes.known(), "Seeded code book");
    }

    /// Issue an order code without recording an order, for orders fulfilled
    /// on the spot.
    pub fn issue_code(&mut self) -> RequestCode {
        self.codes.issue()
    }

    /// Record a pending order at a frozen price.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for zero stars and `InvalidAmount` for a
    /// non-positive price.
    pub fn create(
        &mut self,
        user_id: UserId,
        quantity: u32,
        price_minor: i64,
        recipient: impl Into<String>,
    ) -> Result<PurchaseOrder> {
        if quantity == 0 {
            return Err(BillingError::InvalidQuantity {
                quantity,
                min: 1,
                max: u32::MAX,
            });
        }
        if price_minor <= 0 {
            return Err(BillingError::InvalidAmount(format!(
                "order price must be positive, got {price_minor}"
            )));
        }

        let order = PurchaseOrder::new(self.codes.issue(), user_id, quantity, price_minor, recipient);
        self.orders.insert(order.code.clone(), order.clone());
        self.persist();

        info!(user_id = %user_id, code = %order.code, quantity, price_minor, "Order created");
        Ok(order)
    }

    /// A pending order.
    #[must_use]
    pub fn get(&self, code: &RequestCode) -> Option<&PurchaseOrder> {
        self.orders.get(code)
    }

    /// All pending orders, ordered by code.
    pub fn pending(&self) -> impl Iterator<Item = &PurchaseOrder> {
        self.orders.values()
    }

    /// Remove a pending order.
    pub fn take(&mut self, code: &RequestCode) -> Option<PurchaseOrder> {
        let order = self.orders.remove(code)?;
        self.persist();
        Some(order)
    }

    /// Drop every pending order for which `settled` holds.
    pub(crate) fn drop_where<F>(&mut self, settled: F) -> Vec<RequestCode>
    where
        F: Fn(&PurchaseOrder) -> bool,
    {
        let dropped: Vec<RequestCode> = self
            .orders
            .values()
            .filter(|order| settled(order))
            .map(|order| order.code.clone())
            .collect();
        if !dropped.is_empty() {
            for code in &dropped {
                self.orders.remove(code);
            }
            self.persist();
        }
        dropped
    }

    fn persist(&self) -> bool {
        save_document(self.store.as_ref(), doc::ORDERS, &self.orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryStore;

    #[test]
    fn orders_persist_until_taken() {
        let store = Arc::new(MemoryStore::new());
        let mut tracker = OrderTracker::open(store.clone());

        let order = tracker.create(UserId::new(5), 100, 15_000, "@alice").unwrap();
        assert_eq!(order.recipient, "@alice");

        let mut reopened = OrderTracker::open(store.clone());
        assert_eq!(reopened.get(&order.code).unwrap().price_minor, 15_000);

        reopened.take(&order.code).unwrap();
        assert!(OrderTracker::open(store).get(&order.code).is_none());
    }

    #[test]
    fn invalid_orders_are_rejected() {
        let mut tracker = OrderTracker::open(Arc::new(MemoryStore::new()));
        assert!(tracker.create(UserId::new(5), 0, 15_000, "5").is_err());
        assert!(tracker.create(UserId::new(5), 10, 0, "5").is_err());
        assert_eq!(tracker.pending().count(), 0);
    }

    #[test]
    fn issued_codes_are_distinct() {
        let mut tracker = OrderTracker::open(Arc::new(MemoryStore::new()));
        let spot = tracker.issue_code();
        let order = tracker.create(UserId::new(5), 1, 150, "5").unwrap();
        assert_ne!(spot, order.code);
    }
}
