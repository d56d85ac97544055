//! The order desk: every balance-changing operation of the bot.
//!
//! All mutations run under one lock over [`Books`]. Calls to the payment
//! gateway and the fulfillment executor happen outside that lock; whatever
//! they report is re-checked against the books once the lock is taken again.
//!
//! Admin transitions consult [`Admins`] first and fail with
//! `BillingError::Unauthorized` for everybody else.

use std::collections::BTreeSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use starshop_core::{
    BillingError, GatewayAsset, Limits, ManualTopup, Pricing, PurchaseOrder, RequestCode, Result,
    StatsSummary, UserId,
};
use starshop_store::{
    AutoCharge, Books, GatewaySettlement, OrderApproval, Refund, TopupApproval,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::fulfillment::{FulfillmentExecutor, FulfillmentOutcome};
use crate::gateway::{InvoiceFilter, InvoiceRequest, PaymentGateway};

/// The set of administrators.
#[derive(Debug, Clone, Default)]
pub struct Admins {
    ids: BTreeSet<UserId>,
}

impl Admins {
    /// Admins from configuration.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Whether the user may approve, reject and amend.
    #[must_use]
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.ids.contains(&user_id)
    }

    /// Every admin, for notifications.
    pub fn iter(&self) -> impl Iterator<Item = UserId> + '_ {
        self.ids.iter().copied()
    }

    fn require(&self, user_id: UserId) -> Result<()> {
        if self.is_admin(user_id) {
            Ok(())
        } else {
            warn!(user_id = %user_id, "Non-admin attempted an admin operation");
            Err(BillingError::Unauthorized { user_id })
        }
    }
}

/// A gateway invoice opened for a topup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedInvoice {
    /// Code of the pending topup.
    pub code: RequestCode,
    /// Amount in minor units.
    pub amount_minor: i64,
    /// Asset to pay with.
    pub asset: GatewayAsset,
    /// Payment link.
    pub url: String,
}

/// Outcome of checking a gateway topup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCheck {
    /// The invoice was paid and the balance credited.
    Credited {
        /// Amount credited.
        amount_minor: i64,
        /// Balance after the credit.
        balance_minor: i64,
    },
    /// The invoice exists but is not paid yet.
    NotPaidYet,
    /// The user has nothing awaiting payment.
    NothingPending,
}

/// A credit made from a gateway webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceCredit {
    /// Amount credited.
    pub amount_minor: i64,
    /// Balance after the credit.
    pub balance_minor: i64,
}

/// Outcome of an automatic purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purchase {
    /// Stars were delivered.
    Delivered {
        /// Order code.
        code: RequestCode,
        /// Number of stars.
        quantity: u32,
        /// Amount debited.
        price_minor: i64,
        /// Balance after the debit.
        balance_minor: i64,
    },
    /// The storefront wants the user to pay through a link; the debit stands.
    PaymentLink {
        /// Order code.
        code: RequestCode,
        /// Link for the user.
        url: String,
        /// Balance after the debit.
        balance_minor: i64,
    },
    /// Fulfillment failed and the price was returned.
    Refunded {
        /// Order code.
        code: RequestCode,
        /// Amount returned.
        price_minor: i64,
        /// Balance after the refund.
        balance_minor: i64,
    },
    /// The balance does not cover the price; nothing was charged.
    Insufficient {
        /// Quoted price.
        price_minor: i64,
        /// How much is missing.
        shortfall_minor: i64,
    },
}

/// Numbers for the admin `/stats` view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    /// Totals over every user.
    pub summary: StatsSummary,
    /// Current pricing.
    pub pricing: Pricing,
    /// Estimated margin on every star sold, at current pricing.
    pub margin_minor: i64,
}

/// The order desk.
pub struct Desk {
    books: Arc<Mutex<Books>>,
    admins: Admins,
    limits: Limits,
    gateway: Option<Arc<dyn PaymentGateway>>,
    executor: Option<Arc<dyn FulfillmentExecutor>>,
}

impl Desk {
    /// Create a desk with manual fulfillment and no gateway.
    #[must_use]
    pub fn new(books: Books, admins: Admins, limits: Limits) -> Self {
        Self {
            books: Arc::new(Mutex::new(books)),
            admins,
            limits,
            gateway: None,
            executor: None,
        }
    }

    /// Enable gateway topups.
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Fulfill orders automatically through `executor`.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn FulfillmentExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Administrators.
    #[must_use]
    pub fn admins(&self) -> &Admins {
        &self.admins
    }

    /// Quantity and topup bounds.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Whether orders are fulfilled on the spot.
    #[must_use]
    pub fn is_automatic(&self) -> bool {
        self.executor.is_some()
    }

    /// Whether gateway topups are available.
    #[must_use]
    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current balance of a user.
    pub async fn balance(&self, user_id: UserId) -> i64 {
        self.books.lock().await.ledger().balance(user_id)
    }

    /// Current pricing.
    pub async fn pricing(&self) -> Pricing {
        self.books.lock().await.settings().pricing().clone()
    }

    /// Whether the user has a gateway invoice awaiting payment.
    pub async fn has_pending_invoice(&self, user_id: UserId) -> bool {
        self.books
            .lock()
            .await
            .topups()
            .pending_gateway(user_id)
            .is_some()
    }

    /// Pending manual topup by code.
    pub async fn manual_topup(&self, code: &RequestCode) -> Option<ManualTopup> {
        self.books.lock().await.topups().manual(code).cloned()
    }

    // ========================================================================
    // Gateway topups
    // ========================================================================

    /// Open a gateway topup and create its invoice.
    ///
    /// The pending record is created first so the invoice payload carries
    /// its code.
    pub async fn open_gateway_topup(
        &self,
        user_id: UserId,
        amount_minor: i64,
        asset: GatewayAsset,
    ) -> Result<OpenedInvoice> {
        let gateway = self.gateway()?;
        let topup = self
            .books
            .lock()
            .await
            .topups_mut()
            .open_gateway(user_id, amount_minor, asset)?;

        let invoice = gateway
            .create_invoice(&InvoiceRequest {
                code: topup.code.clone(),
                user_id,
                amount_minor,
                asset,
            })
            .await?;
        let url = invoice
            .url
            .ok_or_else(|| BillingError::external("cryptopay", "invoice without a link"))?;

        self.books.lock().await.topups_mut().attach_invoice(
            user_id,
            &topup.code,
            invoice.invoice_id.to_string(),
        );

        Ok(OpenedInvoice {
            code: topup.code,
            amount_minor,
            asset,
            url,
        })
    }

    /// Ask the gateway whether the user's pending invoice was paid, and
    /// credit it if so. Calling again after a credit reports `NothingPending`.
    pub async fn verify_gateway_topup(&self, user_id: UserId) -> Result<GatewayCheck> {
        let gateway = self.gateway()?;
        let Some(pending) = self.books.lock().await.topups().pending_gateway(user_id).cloned()
        else {
            return Ok(GatewayCheck::NothingPending);
        };

        let paid = gateway
            .find_paid_invoice(&InvoiceFilter {
                user_id,
                code: pending.code.clone(),
            })
            .await?;
        if paid.is_none() {
            return Ok(GatewayCheck::NotPaidYet);
        }

        match self
            .books
            .lock()
            .await
            .settle_gateway_topup(user_id, &pending.code)?
        {
            GatewaySettlement::Credited {
                topup,
                balance_minor,
            } => Ok(GatewayCheck::Credited {
                amount_minor: topup.amount_minor,
                balance_minor,
            }),
            GatewaySettlement::NothingPending => Ok(GatewayCheck::NothingPending),
        }
    }

    /// Credit an invoice the gateway reported as paid.
    ///
    /// Settles the pending topup when it is still known; otherwise credits
    /// the amount the gateway signed for. Returns `None` when the code was
    /// already credited.
    pub async fn settle_paid_invoice(
        &self,
        user_id: UserId,
        code: &RequestCode,
        amount_minor: i64,
    ) -> Result<Option<InvoiceCredit>> {
        let mut books = self.books.lock().await;
        if let GatewaySettlement::Credited {
            topup,
            balance_minor,
        } = books.settle_gateway_topup(user_id, code)?
        {
            return Ok(Some(InvoiceCredit {
                amount_minor: topup.amount_minor,
                balance_minor,
            }));
        }

        Ok(books
            .settle_orphan_invoice(user_id, code, amount_minor)?
            .map(|balance_minor| InvoiceCredit {
                amount_minor,
                balance_minor,
            }))
    }

    fn gateway(&self) -> Result<Arc<dyn PaymentGateway>> {
        self.gateway
            .clone()
            .ok_or_else(|| BillingError::Configuration("payment gateway is not configured".into()))
    }

    // ========================================================================
    // Manual topups
    // ========================================================================

    /// File a bank-transfer topup for an admin to confirm.
    pub async fn request_manual_topup(
        &self,
        user_id: UserId,
        amount_minor: i64,
    ) -> Result<ManualTopup> {
        let topup = self
            .books
            .lock()
            .await
            .topups_mut()
            .create_manual(user_id, amount_minor)?;
        info!(code = %topup.code, user_id = %user_id, amount_minor, "Manual topup requested");
        Ok(topup)
    }

    /// Credit a manual topup.
    pub async fn approve_topup(&self, admin: UserId, code: &RequestCode) -> Result<TopupApproval> {
        self.admins.require(admin)?;
        self.books.lock().await.approve_manual_topup(code)
    }

    /// Drop a manual topup without crediting it.
    pub async fn reject_topup(
        &self,
        admin: UserId,
        code: &RequestCode,
    ) -> Result<Option<ManualTopup>> {
        self.admins.require(admin)?;
        Ok(self.books.lock().await.reject_manual_topup(code))
    }

    /// Change the amount of a pending manual topup to what actually arrived.
    pub async fn amend_topup(
        &self,
        admin: UserId,
        code: &RequestCode,
        amount_minor: i64,
    ) -> Result<Option<ManualTopup>> {
        self.admins.require(admin)?;
        let amended = self
            .books
            .lock()
            .await
            .topups_mut()
            .amend_manual(code, amount_minor)?;
        if amended.is_some() {
            info!(code = %code, admin = %admin, amount_minor, "Manual topup amended");
        }
        Ok(amended)
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// File an order for an admin to fulfill. The balance is checked on
    /// approval, not here.
    pub async fn place_order(
        &self,
        user_id: UserId,
        quantity: u32,
        recipient: &str,
    ) -> Result<PurchaseOrder> {
        let order = self
            .books
            .lock()
            .await
            .place_order(user_id, quantity, recipient, &self.limits)?;
        info!(code = %order.code, user_id = %user_id, quantity, price_minor = order.price_minor, "Order placed");
        Ok(order)
    }

    /// Debit and fulfill an order on the spot.
    ///
    /// The price is debited before the executor is called; a failed delivery
    /// is refunded under the same order code. The sequence runs in its own
    /// task, so it completes even if the caller stops waiting.
    pub async fn buy_now(&self, user_id: UserId, quantity: u32, recipient: &str) -> Result<Purchase> {
        let executor = self
            .executor
            .clone()
            .ok_or_else(|| BillingError::Configuration("fulfillment executor is not configured".into()))?;

        let task = tokio::spawn(fulfill_auto_order(
            Arc::clone(&self.books),
            executor,
            self.limits.clone(),
            user_id,
            quantity,
            recipient.to_string(),
        ));
        task.await
            .map_err(|e| BillingError::external("fulfillment", format!("order task failed: {e}")))?
    }

    /// Debit the frozen price of an order and mark it delivered.
    pub async fn approve_order(&self, admin: UserId, code: &RequestCode) -> Result<OrderApproval> {
        self.admins.require(admin)?;
        self.books.lock().await.approve_order(code)
    }

    /// Drop an order without debiting.
    pub async fn reject_order(
        &self,
        admin: UserId,
        code: &RequestCode,
    ) -> Result<Option<PurchaseOrder>> {
        self.admins.require(admin)?;
        Ok(self.books.lock().await.reject_order(code))
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// Change the price per star. Existing orders keep their price.
    pub async fn set_unit_price(&self, admin: UserId, unit_price: Decimal) -> Result<Pricing> {
        self.admins.require(admin)?;
        ensure_positive_price(unit_price)?;
        let mut books = self.books.lock().await;
        books.settings_mut().set_unit_price(unit_price);
        info!(admin = %admin, unit_price = %unit_price, "Unit price changed");
        Ok(books.settings().pricing().clone())
    }

    /// Change the cost per star used for margin estimates.
    pub async fn set_unit_cost(&self, admin: UserId, unit_cost: Decimal) -> Result<Pricing> {
        self.admins.require(admin)?;
        ensure_positive_price(unit_cost)?;
        let mut books = self.books.lock().await;
        books.settings_mut().set_unit_cost(unit_cost);
        info!(admin = %admin, unit_cost = %unit_cost, "Unit cost changed");
        Ok(books.settings().pricing().clone())
    }

    /// Overwrite a user's balance from a backup. Returns the previous balance.
    pub async fn restore_balance(
        &self,
        admin: UserId,
        user_id: UserId,
        balance_minor: i64,
    ) -> Result<i64> {
        self.admins.require(admin)?;
        let previous = self
            .books
            .lock()
            .await
            .restore_balance(user_id, balance_minor)?;
        warn!(admin = %admin, user_id = %user_id, previous, balance_minor, "Balance restored");
        Ok(previous)
    }

    /// Totals and margin for admins.
    pub async fn stats_report(&self, admin: UserId) -> Result<StatsReport> {
        self.admins.require(admin)?;
        let books = self.books.lock().await;
        let summary = books.stats().summary();
        let pricing = books.settings().pricing().clone();
        Ok(StatsReport {
            margin_minor: pricing.margin_minor(summary.total_goods_units),
            summary,
            pricing,
        })
    }
}

async fn fulfill_auto_order(
    books: Arc<Mutex<Books>>,
    executor: Arc<dyn FulfillmentExecutor>,
    limits: Limits,
    user_id: UserId,
    quantity: u32,
    recipient: String,
) -> Result<Purchase> {
    let charge = books
        .lock()
        .await
        .charge_auto_order(user_id, quantity, &limits)?;
    let (order, balance_minor) = match charge {
        AutoCharge::Charged {
            order,
            balance_minor,
        } => (order, balance_minor),
        AutoCharge::Insufficient {
            price_minor,
            shortfall_minor,
        } => {
            return Ok(Purchase::Insufficient {
                price_minor,
                shortfall_minor,
            })
        }
    };

    info!(code = %order.code, user_id = %user_id, quantity, recipient = %recipient, "Fulfilling order");
    match executor.fulfill(&recipient, quantity).await {
        Ok(FulfillmentOutcome::Confirmed { confirmation }) => {
            books.lock().await.confirm_auto_order(&order);
            info!(code = %order.code, confirmation = %confirmation, "Order delivered");
            Ok(Purchase::Delivered {
                code: order.code,
                quantity,
                price_minor: order.price_minor,
                balance_minor,
            })
        }
        Ok(FulfillmentOutcome::PaymentLink { url }) => {
            info!(code = %order.code, "Storefront answered with a payment link");
            Ok(Purchase::PaymentLink {
                code: order.code,
                url,
                balance_minor,
            })
        }
        Err(e) => {
            warn!(code = %order.code, user_id = %user_id, error = %e, "Fulfillment failed, refunding");
            let mut books = books.lock().await;
            let balance_minor = match books.refund_auto_order(&order)? {
                Refund::Applied { balance_minor } => balance_minor,
                Refund::AlreadyRefunded => books.ledger().balance(user_id),
            };
            Ok(Purchase::Refunded {
                code: order.code,
                price_minor: order.price_minor,
                balance_minor,
            })
        }
    }
}

fn ensure_positive_price(value: Decimal) -> Result<()> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(BillingError::InvalidAmount(format!(
            "price must be positive, got {value}"
        )))
    }
}
