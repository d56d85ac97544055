//! Operations spanning several documents.
//!
//! Every settlement writes in the same order:
//!
//! 1. the ledger document (balance and journal entry, one write)
//! 2. the stats document
//! 3. the document holding the pending request
//!
//! The ledger write is the commit point. If the process dies after it,
//! [`Books::open`] finds the journal entry, drops the leftover request and
//! replays the missing stats, so nothing is credited or counted twice.

use std::sync::Arc;

use starshop_core::{
    EntryKind, GatewayTopup, Limits, ManualTopup, Pricing, PurchaseOrder, RequestCode, Result,
    UserId,
};
use tracing::{info, warn};

use crate::document::DocumentStore;
use crate::ledger::{Debit, Ledger, Refund};
use crate::orders::OrderTracker;
use crate::settings::Settings;
use crate::stats::StatsBook;
use crate::topups::TopupTracker;

/// Outcome of approving a manual topup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopupApproval {
    /// The balance was credited.
    Approved {
        /// The settled request.
        topup: ManualTopup,
        /// Balance after the credit.
        balance_minor: i64,
    },
    /// No such request is pending.
    NotFound,
}

/// Outcome of settling a paid gateway invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewaySettlement {
    /// The balance was credited.
    Credited {
        /// The settled topup.
        topup: GatewayTopup,
        /// Balance after the credit.
        balance_minor: i64,
    },
    /// The user has no pending topup with this code, or it was settled.
    NothingPending,
}

/// Outcome of approving a purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderApproval {
    /// The order was paid and counted as delivered.
    Approved {
        /// The settled order.
        order: PurchaseOrder,
        /// Balance after the debit.
        balance_minor: i64,
    },
    /// The balance no longer covers the price; the order stays pending.
    InsufficientFunds {
        /// The order.
        order: PurchaseOrder,
        /// How much is missing.
        shortfall_minor: i64,
    },
    /// No such order is pending.
    NotFound,
}

/// An order already paid for, to be fulfilled on the spot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoOrder {
    /// Order code, also the journal reference.
    pub code: RequestCode,
    /// The paying user.
    pub user_id: UserId,
    /// Number of stars.
    pub quantity: u32,
    /// Amount debited.
    pub price_minor: i64,
}

/// Outcome of charging an automatic order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoCharge {
    /// The price was debited.
    Charged {
        /// The paid order.
        order: AutoOrder,
        /// Balance after the debit.
        balance_minor: i64,
    },
    /// The balance does not cover the price; nothing changed.
    Insufficient {
        /// Quoted price.
        price_minor: i64,
        /// How much is missing.
        shortfall_minor: i64,
    },
}

/// All persistent state of the shop.
pub struct Books {
    ledger: Ledger,
    stats: StatsBook,
    topups: TopupTracker,
    orders: OrderTracker,
    settings: Settings,
}

impl Books {
    /// Open every document and repair the effects of an interrupted write.
    #[must_use]
    pub fn open(store: Arc<dyn DocumentStore>, default_pricing: Pricing) -> Self {
        let mut books = Self {
            ledger: Ledger::open(store.clone()),
            stats: StatsBook::open(store.clone()),
            topups: TopupTracker::open(store.clone()),
            orders: OrderTracker::open(store.clone()),
            settings: Settings::open(store, default_pricing),
        };
        books.reconcile();
        books
    }

    fn reconcile(&mut self) {
        let Self {
            ledger,
            stats,
            topups,
            orders,
            ..
        } = self;

        for entry in ledger.journal() {
            let Some(code) = entry.reference.as_ref() else {
                continue;
            };
            match entry.kind {
                EntryKind::Deposit => {
                    topups.seed_codes([code.clone()]);
                    if !stats.has_deposit(code) {
                        warn!(code = %code, "Replaying deposit missing from stats");
                        stats.record_deposit(entry.user_id, entry.amount_minor, code);
                    }
                }
                EntryKind::Purchase => {
                    orders.seed_codes([code.clone()]);
                    if let Some(units) = entry.goods_units {
                        if !stats.has_goods(code) {
                            warn!(code = %code, "Replaying delivery missing from stats");
                            stats.record_goods(entry.user_id, units, code);
                        }
                    }
                }
                EntryKind::Refund => orders.seed_codes([code.clone()]),
                EntryKind::Restore => {}
            }
        }

        let settled_topups =
            topups.drop_manual_where(|topup| ledger.is_settled(EntryKind::Deposit, &topup.code));
        let settled_orders =
            orders.drop_where(|order| ledger.is_settled(EntryKind::Purchase, &order.code));
        if !settled_topups.is_empty() || !settled_orders.is_empty() {
            warn!(
                topups = settled_topups.len(),
                orders = settled_orders.len(),
                "Dropped pending records that were already settled"
            );
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Balances and journal.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Lifetime statistics.
    #[must_use]
    pub fn stats(&self) -> &StatsBook {
        &self.stats
    }

    /// Pending topups.
    #[must_use]
    pub fn topups(&self) -> &TopupTracker {
        &self.topups
    }

    /// Pending topups, for opening and amending requests.
    pub fn topups_mut(&mut self) -> &mut TopupTracker {
        &mut self.topups
    }

    /// Pending orders.
    #[must_use]
    pub fn orders(&self) -> &OrderTracker {
        &self.orders
    }

    /// Current pricing.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Pricing, for admin changes.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    // ========================================================================
    // Topups
    // ========================================================================

    /// Credit a pending manual topup and remove it.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger rejects the amount.
    pub fn approve_manual_topup(&mut self, code: &RequestCode) -> Result<TopupApproval> {
        let Some(topup) = self.topups.manual(code).cloned() else {
            return Ok(TopupApproval::NotFound);
        };
        if self.ledger.is_settled(EntryKind::Deposit, code) {
            self.topups.take_manual(code);
            return Ok(TopupApproval::NotFound);
        }

        let balance_minor = self
            .ledger
            .credit(topup.user_id, topup.amount_minor, code.clone())?;
        self.stats
            .record_deposit(topup.user_id, topup.amount_minor, code);
        self.topups.take_manual(code);

        info!(code = %code, user_id = %topup.user_id, "Manual topup approved");
        Ok(TopupApproval::Approved {
            topup,
            balance_minor,
        })
    }

    /// Remove a pending manual topup without touching any balance.
    pub fn reject_manual_topup(&mut self, code: &RequestCode) -> Option<ManualTopup> {
        let topup = self.topups.take_manual(code)?;
        info!(code = %code, user_id = %topup.user_id, "Manual topup rejected");
        Some(topup)
    }

    /// Credit the user's gateway topup once its invoice is paid.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger rejects the amount.
    pub fn settle_gateway_topup(
        &mut self,
        user_id: UserId,
        code: &RequestCode,
    ) -> Result<GatewaySettlement> {
        let Some(topup) = self.topups.take_gateway(user_id, code) else {
            return Ok(GatewaySettlement::NothingPending);
        };
        if self.ledger.is_settled(EntryKind::Deposit, code) {
            return Ok(GatewaySettlement::NothingPending);
        }

        let balance_minor = self
            .ledger
            .credit(user_id, topup.amount_minor, code.clone())?;
        self.stats.record_deposit(user_id, topup.amount_minor, code);

        info!(code = %code, user_id = %user_id, asset = %topup.asset, "Gateway topup settled");
        Ok(GatewaySettlement::Credited {
            topup,
            balance_minor,
        })
    }

    /// Credit a paid invoice whose pending topup is no longer in memory,
    /// e.g. after a restart. Only for invoices the gateway itself vouched for.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger rejects the amount.
    pub fn settle_orphan_invoice(
        &mut self,
        user_id: UserId,
        code: &RequestCode,
        amount_minor: i64,
    ) -> Result<Option<i64>> {
        if self.ledger.is_settled(EntryKind::Deposit, code) {
            return Ok(None);
        }
        self.topups.seed_codes([code.clone()]);
        let balance_minor = self.ledger.credit(user_id, amount_minor, code.clone())?;
        self.stats.record_deposit(user_id, amount_minor, code);

        warn!(code = %code, user_id = %user_id, amount_minor, "Credited paid invoice without a pending topup");
        Ok(Some(balance_minor))
    }

    // ========================================================================
    // Manual orders
    // ========================================================================

    /// Create a pending order, freezing the current price.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` if the quantity is out of bounds.
    pub fn place_order(
        &mut self,
        user_id: UserId,
        quantity: u32,
        recipient: impl Into<String>,
        limits: &Limits,
    ) -> Result<PurchaseOrder> {
        limits.check_quantity(quantity)?;
        let price_minor = self.settings.pricing().quote(quantity)?;
        self.orders.create(user_id, quantity, price_minor, recipient)
    }

    /// Debit the frozen price of a pending order and count it delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger rejects the amount.
    pub fn approve_order(&mut self, code: &RequestCode) -> Result<OrderApproval> {
        let Some(order) = self.orders.get(code).cloned() else {
            return Ok(OrderApproval::NotFound);
        };
        if self.ledger.is_settled(EntryKind::Purchase, code) {
            self.orders.take(code);
            return Ok(OrderApproval::NotFound);
        }

        let debit = self.ledger.debit_delivered(
            order.user_id,
            order.price_minor,
            code.clone(),
            order.quantity,
        )?;
        match debit {
            Debit::Applied { balance_minor } => {
                self.stats.record_goods(order.user_id, order.quantity, code);
                self.orders.take(code);

                info!(code = %code, user_id = %order.user_id, "Order approved");
                Ok(OrderApproval::Approved {
                    order,
                    balance_minor,
                })
            }
            Debit::Insufficient { shortfall_minor } => {
                warn!(code = %code, user_id = %order.user_id, shortfall_minor, "Order approval lacks funds");
                Ok(OrderApproval::InsufficientFunds {
                    order,
                    shortfall_minor,
                })
            }
        }
    }

    /// Remove a pending order without touching any balance.
    pub fn reject_order(&mut self, code: &RequestCode) -> Option<PurchaseOrder> {
        let order = self.orders.take(code)?;
        info!(code = %code, user_id = %order.user_id, "Order rejected");
        Some(order)
    }

    // ========================================================================
    // Automatic orders
    // ========================================================================

    /// Debit the current price of an order fulfilled on the spot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` if the quantity is out of bounds.
    pub fn charge_auto_order(
        &mut self,
        user_id: UserId,
        quantity: u32,
        limits: &Limits,
    ) -> Result<AutoCharge> {
        limits.check_quantity(quantity)?;
        let price_minor = self.settings.pricing().quote(quantity)?;
        let code = self.orders.issue_code();

        match self
            .ledger
            .debit_if_sufficient(user_id, price_minor, code.clone())?
        {
            Debit::Applied { balance_minor } => Ok(AutoCharge::Charged {
                order: AutoOrder {
                    code,
                    user_id,
                    quantity,
                    price_minor,
                },
                balance_minor,
            }),
            Debit::Insufficient { shortfall_minor } => Ok(AutoCharge::Insufficient {
                price_minor,
                shortfall_minor,
            }),
        }
    }

    /// Count a charged order as delivered.
    pub fn confirm_auto_order(&mut self, order: &AutoOrder) {
        self.stats
            .record_goods(order.user_id, order.quantity, &order.code);
    }

    /// Return the price of a charged order whose fulfillment failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger rejects the amount.
    pub fn refund_auto_order(&mut self, order: &AutoOrder) -> Result<Refund> {
        self.ledger
            .refund(order.user_id, order.price_minor, order.code.clone())
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// Overwrite a balance. Returns the previous balance.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for negative balances.
    pub fn restore_balance(&mut self, user_id: UserId, balance_minor: i64) -> Result<i64> {
        self.ledger.restore(user_id, balance_minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryStore;
    use crate::schema::doc;
    use rust_decimal_macros::dec;
    use starshop_core::{BillingError, GatewayAsset, LifetimeStats};

    fn setup() -> (Arc<MemoryStore>, Books) {
        let store = Arc::new(MemoryStore::new());
        let books = Books::open(store.clone(), Pricing::default());
        (store, books)
    }

    fn user() -> UserId {
        UserId::new(1001)
    }

    fn credit(books: &mut Books, amount_minor: i64) {
        let topup = books.topups_mut().create_manual(user(), amount_minor).unwrap();
        books.approve_manual_topup(&topup.code).unwrap();
    }

    #[test]
    fn topup_then_order_scenario() {
        let (_, mut books) = setup();
        let limits = Limits::default();

        let topup = books.topups_mut().create_manual(user(), 50_000).unwrap();
        assert_eq!(books.ledger().balance(user()), 0);

        let TopupApproval::Approved { balance_minor, .. } =
            books.approve_manual_topup(&topup.code).unwrap()
        else {
            panic!("expected approval");
        };
        assert_eq!(balance_minor, 50_000);

        let order = books.place_order(user(), 100, "@buyer", &limits).unwrap();
        assert_eq!(order.price_minor, 15_000);

        let OrderApproval::Approved { balance_minor, .. } = books.approve_order(&order.code).unwrap()
        else {
            panic!("expected approval");
        };
        assert_eq!(balance_minor, 35_000);

        let second = books.place_order(user(), 100, "@buyer", &limits).unwrap();
        books.approve_order(&second.code).unwrap();
        assert_eq!(books.ledger().balance(user()), 20_000);

        assert_eq!(
            books.stats().get(user()),
            LifetimeStats {
                total_deposited_minor: 50_000,
                total_goods_units: 200,
            }
        );
    }

    #[test]
    fn approval_with_insufficient_balance_keeps_the_order() {
        let (_, mut books) = setup();
        credit(&mut books, 5_000);
        let order = books
            .place_order(user(), 100, "@buyer", &Limits::default())
            .unwrap();

        let approval = books.approve_order(&order.code).unwrap();
        assert!(matches!(
            approval,
            OrderApproval::InsufficientFunds {
                shortfall_minor: 10_000,
                ..
            }
        ));
        assert_eq!(books.ledger().balance(user()), 5_000);
        assert!(books.orders().get(&order.code).is_some());
    }

    #[test]
    fn second_approval_finds_nothing() {
        let (_, mut books) = setup();
        let topup = books.topups_mut().create_manual(user(), 50_000).unwrap();

        books.approve_manual_topup(&topup.code).unwrap();
        assert_eq!(
            books.approve_manual_topup(&topup.code).unwrap(),
            TopupApproval::NotFound
        );
        assert_eq!(books.ledger().balance(user()), 50_000);
        assert_eq!(books.stats().get(user()).total_deposited_minor, 50_000);
    }

    #[test]
    fn rejection_leaves_balance_unchanged() {
        let (_, mut books) = setup();
        credit(&mut books, 20_000);

        let topup = books.topups_mut().create_manual(user(), 10_000).unwrap();
        assert!(books.reject_manual_topup(&topup.code).is_some());
        assert!(books.reject_manual_topup(&topup.code).is_none());

        let order = books
            .place_order(user(), 10, "@buyer", &Limits::default())
            .unwrap();
        assert!(books.reject_order(&order.code).is_some());

        assert_eq!(books.ledger().balance(user()), 20_000);
        assert_eq!(books.stats().get(user()).total_goods_units, 0);
    }

    #[test]
    fn order_price_is_frozen_at_creation() {
        let (_, mut books) = setup();
        credit(&mut books, 50_000);
        let order = books
            .place_order(user(), 100, "@buyer", &Limits::default())
            .unwrap();

        books.settings_mut().set_unit_price(dec!(2.00));
        books.approve_order(&order.code).unwrap();

        assert_eq!(books.ledger().balance(user()), 35_000);
    }

    #[test]
    fn quantity_bounds_are_enforced_at_creation() {
        let (_, mut books) = setup();
        let err = books
            .place_order(user(), 0, "@buyer", &Limits::default())
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidQuantity { .. }));
        assert!(books
            .place_order(user(), 5_001, "@buyer", &Limits::default())
            .is_err());
    }

    #[test]
    fn state_survives_restart() {
        let (store, mut books) = setup();
        credit(&mut books, 50_000);
        let pending_topup = books.topups_mut().create_manual(user(), 7_000).unwrap();
        let pending_order = books
            .place_order(user(), 10, "@buyer", &Limits::default())
            .unwrap();
        books.settings_mut().set_unit_price(dec!(1.60));
        drop(books);

        let mut books = Books::open(store, Pricing::default());
        assert_eq!(books.ledger().balance(user()), 50_000);
        assert_eq!(books.stats().get(user()).total_deposited_minor, 50_000);
        assert!(books.topups().manual(&pending_topup.code).is_some());
        assert!(books.orders().get(&pending_order.code).is_some());
        assert_eq!(books.settings().pricing().unit_price, dec!(1.60));

        books.approve_manual_topup(&pending_topup.code).unwrap();
        assert_eq!(books.ledger().balance(user()), 57_000);
    }

    #[test]
    fn crash_after_ledger_write_is_repaired_on_open() {
        let (store, mut books) = setup();
        let topup = books.topups_mut().create_manual(user(), 50_000).unwrap();
        credit(&mut books, 10_000);
        let order = books
            .place_order(user(), 10, "@buyer", &Limits::default())
            .unwrap();

        // Snapshot the documents written after the ledger, then approve.
        let stats_before = store.load(doc::STATS).unwrap();
        let topups_before = store.load(doc::MANUAL_TOPUPS).unwrap();
        let orders_before = store.load(doc::ORDERS).unwrap();
        books.approve_manual_topup(&topup.code).unwrap();
        books.approve_order(&order.code).unwrap();
        drop(books);

        // Only the ledger write made it to disk.
        store.put(doc::STATS, stats_before);
        store.put(doc::MANUAL_TOPUPS, topups_before);
        store.put(doc::ORDERS, orders_before);

        let mut books = Books::open(store, Pricing::default());
        assert_eq!(books.ledger().balance(user()), 58_500);
        assert!(books.topups().manual(&topup.code).is_none());
        assert!(books.orders().get(&order.code).is_none());
        assert_eq!(
            books.stats().get(user()),
            LifetimeStats {
                total_deposited_minor: 60_000,
                total_goods_units: 10,
            }
        );
        assert_eq!(
            books.approve_manual_topup(&topup.code).unwrap(),
            TopupApproval::NotFound
        );
    }

    #[test]
    fn gateway_topup_settles_once() {
        let (_, mut books) = setup();
        let topup = books
            .topups_mut()
            .open_gateway(user(), 30_000, GatewayAsset::Usdt)
            .unwrap();

        assert!(matches!(
            books.settle_gateway_topup(user(), &topup.code).unwrap(),
            GatewaySettlement::Credited {
                balance_minor: 30_000,
                ..
            }
        ));
        assert_eq!(
            books.settle_gateway_topup(user(), &topup.code).unwrap(),
            GatewaySettlement::NothingPending
        );
        assert_eq!(books.ledger().balance(user()), 30_000);
    }

    #[test]
    fn orphan_invoice_is_credited_once() {
        let (_, mut books) = setup();
        let code = RequestCode::generate();

        assert_eq!(
            books.settle_orphan_invoice(user(), &code, 50_000).unwrap(),
            Some(50_000)
        );
        assert_eq!(books.settle_orphan_invoice(user(), &code, 50_000).unwrap(), None);
        assert_eq!(books.stats().get(user()).total_deposited_minor, 50_000);
    }

    #[test]
    fn failed_auto_order_is_refunded_once() {
        let (_, mut books) = setup();
        credit(&mut books, 20_000);

        let AutoCharge::Charged { order, balance_minor } = books
            .charge_auto_order(user(), 100, &Limits::default())
            .unwrap()
        else {
            panic!("expected charge");
        };
        assert_eq!(balance_minor, 5_000);

        assert!(matches!(
            books.refund_auto_order(&order).unwrap(),
            Refund::Applied {
                balance_minor: 20_000
            }
        ));
        assert_eq!(
            books.refund_auto_order(&order).unwrap(),
            Refund::AlreadyRefunded
        );
        assert_eq!(books.ledger().balance(user()), 20_000);
        assert_eq!(books.stats().get(user()).total_goods_units, 0);
    }

    #[test]
    fn confirmed_auto_order_counts_goods() {
        let (_, mut books) = setup();
        credit(&mut books, 20_000);

        let AutoCharge::Charged { order, .. } = books
            .charge_auto_order(user(), 100, &Limits::default())
            .unwrap()
        else {
            panic!("expected charge");
        };
        books.confirm_auto_order(&order);
        assert_eq!(books.stats().get(user()).total_goods_units, 100);

        assert!(matches!(
            books.charge_auto_order(user(), 100, &Limits::default()).unwrap(),
            AutoCharge::Insufficient {
                price_minor: 15_000,
                shortfall_minor: 10_000,
            }
        ));
    }

    #[test]
    fn file_store_writes_every_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(crate::document::FileStore::open(dir.path()).unwrap());
        let mut books = Books::open(store.clone(), Pricing::default());

        credit(&mut books, 20_000);
        books.topups_mut().create_manual(user(), 1_000).unwrap();
        books
            .place_order(user(), 50, "@buyer", &Limits::default())
            .unwrap();
        books.settings_mut().set_unit_price(dec!(1.60));

        for name in crate::schema::all_documents() {
            assert!(
                dir.path().join(format!("{name}.json")).exists(),
                "{name} was not written"
            );
        }

        let reopened = Books::open(store, Pricing::default());
        assert_eq!(reopened.ledger().balance(user()), 20_000);
        assert_eq!(reopened.settings().pricing().unit_price, dec!(1.60));
        assert_eq!(reopened.topups().pending_manual().count(), 1);
    }
}
