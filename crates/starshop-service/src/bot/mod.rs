//! Conversation dispatcher.
//!
//! Turns front-end events into desk operations and renders the replies.
//! Every reply is addressed: answers go to the sender, notifications to
//! admins or to the user whose request an admin just handled.

mod callbacks;
mod commands;
mod screens;
mod sessions;

use std::sync::Arc;

use starshop_core::{
    decimal_to_minor, major_to_minor, parse_major, BillingError, Event, EventKind, GatewayAsset,
    InputMode, Outgoing, RequestCode, Result, UserId,
};
use starshop_store::{OrderApproval, TopupApproval};
use tracing::{debug, error, info};

pub use callbacks::{Callback, UnknownCallback};
pub use commands::Command;
pub use sessions::Sessions;

use crate::desk::{Desk, GatewayCheck, InvoiceCredit, Purchase};
use crate::membership::SubscriptionGate;

/// Notification for a user whose invoice was settled by a webhook.
#[must_use]
pub fn invoice_paid_notice(user_id: UserId, credit: &InvoiceCredit) -> Outgoing {
    screens::gateway_credited(user_id, credit.amount_minor, credit.balance_minor)
}

/// Maps events to desk operations.
pub struct Dispatcher {
    desk: Arc<Desk>,
    sessions: Sessions,
    gate: Option<Arc<dyn SubscriptionGate>>,
    sbp_instruction: String,
}

impl Dispatcher {
    /// Create a dispatcher without a subscription gate.
    #[must_use]
    pub fn new(desk: Arc<Desk>, sbp_instruction: impl Into<String>) -> Self {
        Self {
            desk,
            sessions: Sessions::default(),
            gate: None,
            sbp_instruction: sbp_instruction.into(),
        }
    }

    /// Require channel membership for topups and purchases.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn SubscriptionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Handle one event. Errors become replies; nothing escapes.
    pub async fn handle(&self, event: &Event) -> Vec<Outgoing> {
        let user_id = event.user_id;
        if event.admin_hint && !self.desk.admins().is_admin(user_id) {
            debug!(user_id = %user_id, "Ignoring admin hint for a non-admin");
        }

        let result = match &event.kind {
            EventKind::Text { text } => self.on_text(event, text).await,
            EventKind::Button { data } => match data.parse::<Callback>() {
                Ok(callback) => self.on_callback(event, callback).await,
                Err(e) => {
                    debug!(user_id = %user_id, error = %e, "Unknown button");
                    Ok(vec![screens::main_menu(user_id)])
                }
            },
        };

        result.unwrap_or_else(|e| vec![error_reply(user_id, &e)])
    }

    // ========================================================================
    // Buttons
    // ========================================================================

    async fn on_callback(&self, event: &Event, callback: Callback) -> Result<Vec<Outgoing>> {
        let user_id = event.user_id;
        let reply = match callback {
            Callback::Menu => {
                self.sessions.with(user_id, |s| s.take_mode());
                screens::main_menu(user_id)
            }
            Callback::Balance => {
                let balance = self.desk.balance(user_id).await;
                let pending = self.desk.has_pending_invoice(user_id).await;
                screens::balance(user_id, balance, pending)
            }
            Callback::TopupAmount(major) => {
                let limits = self.desk.limits();
                if limits.topup_allowed(major) {
                    let amount_minor = major_to_minor(major)?;
                    self.sessions.with(user_id, |s| s.select_topup(amount_minor));
                    screens::payment_methods(user_id, amount_minor, self.desk.has_gateway())
                } else {
                    screens::topup_out_of_range(user_id, limits.min_topup_major, limits.max_topup_major)
                }
            }
            Callback::TopupCustom => {
                self.sessions.with(user_id, |s| s.await_topup_amount());
                let limits = self.desk.limits();
                screens::ask_topup_amount(user_id, limits.min_topup_major, limits.max_topup_major)
            }
            Callback::PaySbp => {
                if let Some(refusal) = self.check_gate(user_id).await {
                    return Ok(vec![refusal]);
                }
                match self.sessions.with(user_id, |s| s.selected_topup()) {
                    Some(amount) => screens::sbp_instructions(user_id, amount, &self.sbp_instruction),
                    None => screens::choose_amount_first(user_id),
                }
            }
            Callback::PaidSbp => return self.file_manual_topup(event).await,
            Callback::PayTon => return self.open_invoice(user_id, GatewayAsset::Ton).await,
            Callback::PayUsdt => return self.open_invoice(user_id, GatewayAsset::Usdt).await,
            Callback::CheckCrypto => self.check_invoice(user_id).await?,
            Callback::BuyMenu => screens::buy_menu(user_id, &self.desk.pricing().await),
            Callback::Buy(quantity) => return self.purchase(event, quantity).await,
            Callback::Custom => {
                self.sessions.with(user_id, |s| s.await_quantity());
                let limits = self.desk.limits();
                screens::ask_quantity(user_id, limits.min_quantity, limits.max_quantity)
            }
            Callback::TopupOk(code) => return self.approve_topup(user_id, &code).await,
            Callback::TopupNo(code) => return self.reject_topup(user_id, &code).await,
            Callback::TopupEdit(code) => {
                if !self.desk.admins().is_admin(user_id) {
                    return Err(BillingError::Unauthorized { user_id });
                }
                match self.desk.manual_topup(&code).await {
                    Some(topup) => {
                        self.sessions.with(user_id, |s| s.await_amended_amount(code));
                        screens::ask_amended_amount(user_id, &topup)
                    }
                    None => screens::already_handled(user_id, &code),
                }
            }
            Callback::OrderOk(code) => return self.approve_order(user_id, &code).await,
            Callback::OrderNo(code) => return self.reject_order(user_id, &code).await,
        };
        Ok(vec![reply])
    }

    // ========================================================================
    // Text
    // ========================================================================

    async fn on_text(&self, event: &Event, text: &str) -> Result<Vec<Outgoing>> {
        let user_id = event.user_id;
        if let Some(command) = Command::parse(text) {
            return self.on_command(user_id, command).await;
        }

        let mode = self.sessions.with(user_id, |s| s.take_mode());
        let reply = match mode {
            InputMode::Idle => screens::unknown_input(user_id),
            InputMode::AwaitingTopupAmount => {
                let limits = self.desk.limits();
                match text.trim().parse::<i64>() {
                    Ok(major) if limits.topup_allowed(major) => {
                        let amount_minor = major_to_minor(major)?;
                        self.sessions.with(user_id, |s| s.select_topup(amount_minor));
                        screens::payment_methods(user_id, amount_minor, self.desk.has_gateway())
                    }
                    Ok(_) => {
                        self.sessions.with(user_id, |s| s.await_topup_amount());
                        screens::topup_out_of_range(
                            user_id,
                            limits.min_topup_major,
                            limits.max_topup_major,
                        )
                    }
                    Err(_) => {
                        self.sessions.with(user_id, |s| s.await_topup_amount());
                        screens::invalid_number(user_id)
                    }
                }
            }
            InputMode::AwaitingQuantity => match text.trim().parse::<u64>() {
                Ok(raw) => {
                    let quantity = self.desk.limits().clamp_quantity(raw);
                    return self.purchase(event, quantity).await;
                }
                Err(_) => {
                    self.sessions.with(user_id, |s| s.await_quantity());
                    screens::invalid_number(user_id)
                }
            },
            InputMode::AwaitingAmendedAmount { code } => {
                match parse_major(text).and_then(decimal_to_minor) {
                    Ok(amount_minor) => match self.desk.amend_topup(user_id, &code, amount_minor).await {
                        Ok(Some(topup)) => screens::topup_amended(user_id, &topup),
                        Ok(None) => screens::already_handled(user_id, &code),
                        Err(BillingError::InvalidAmount(_)) => {
                            self.sessions.with(user_id, |s| s.await_amended_amount(code));
                            screens::invalid_number(user_id)
                        }
                        Err(e) => return Err(e),
                    },
                    Err(_) => {
                        self.sessions.with(user_id, |s| s.await_amended_amount(code));
                        screens::invalid_number(user_id)
                    }
                }
            }
        };
        Ok(vec![reply])
    }

    async fn on_command(&self, user_id: UserId, command: Command) -> Result<Vec<Outgoing>> {
        if command.is_admin_only() && !self.desk.admins().is_admin(user_id) {
            return Ok(vec![screens::not_allowed(user_id)]);
        }

        let reply = match command {
            Command::Start => {
                self.sessions.with(user_id, |s| s.take_mode());
                screens::welcome(user_id, &self.desk.pricing().await)
            }
            Command::SetPrice(price) => {
                screens::pricing_changed(user_id, &self.desk.set_unit_price(user_id, price).await?)
            }
            Command::SetCost(cost) => {
                screens::pricing_changed(user_id, &self.desk.set_unit_cost(user_id, cost).await?)
            }
            Command::Stats => screens::stats(user_id, &self.desk.stats_report(user_id).await?),
            Command::CheckGate => {
                let diagnosis = match &self.gate {
                    Some(gate) => Some(gate.diagnose().await),
                    None => None,
                };
                screens::gate_report(user_id, diagnosis.as_ref())
            }
            Command::RestoreBalance {
                user_id: target,
                amount,
            } => {
                let balance_minor = decimal_to_minor(amount)?;
                let previous = self
                    .desk
                    .restore_balance(user_id, target, balance_minor)
                    .await?;
                screens::balance_restored(user_id, target, previous, balance_minor)
            }
            Command::Usage(usage) => screens::usage(user_id, usage),
        };
        Ok(vec![reply])
    }

    // ========================================================================
    // Topups
    // ========================================================================

    async fn file_manual_topup(&self, event: &Event) -> Result<Vec<Outgoing>> {
        let user_id = event.user_id;
        if let Some(refusal) = self.check_gate(user_id).await {
            return Ok(vec![refusal]);
        }
        let Some(amount_minor) = self.sessions.with(user_id, |s| s.selected_topup()) else {
            return Ok(vec![screens::choose_amount_first(user_id)]);
        };

        let topup = self.desk.request_manual_topup(user_id, amount_minor).await?;
        self.sessions.with(user_id, |s| s.clear_topup());

        let from = event.recipient();
        let mut replies = vec![screens::manual_topup_filed(&topup)];
        replies.extend(
            self.desk
                .admins()
                .iter()
                .map(|admin| screens::admin_topup_request(admin, &topup, &from)),
        );
        Ok(replies)
    }

    async fn open_invoice(&self, user_id: UserId, asset: GatewayAsset) -> Result<Vec<Outgoing>> {
        if let Some(refusal) = self.check_gate(user_id).await {
            return Ok(vec![refusal]);
        }
        if !self.desk.has_gateway() {
            return Ok(vec![screens::gateway_unavailable(user_id, Some(asset))]);
        }
        let Some(amount_minor) = self.sessions.with(user_id, |s| s.selected_topup()) else {
            return Ok(vec![screens::choose_amount_first(user_id)]);
        };

        let invoice = self
            .desk
            .open_gateway_topup(user_id, amount_minor, asset)
            .await?;
        self.sessions.with(user_id, |s| s.clear_topup());
        Ok(vec![screens::invoice(user_id, &invoice)])
    }

    async fn check_invoice(&self, user_id: UserId) -> Result<Outgoing> {
        if !self.desk.has_gateway() {
            return Ok(screens::nothing_to_check(user_id));
        }
        Ok(match self.desk.verify_gateway_topup(user_id).await? {
            GatewayCheck::Credited {
                amount_minor,
                balance_minor,
            } => screens::gateway_credited(user_id, amount_minor, balance_minor),
            GatewayCheck::NotPaidYet => screens::not_paid_yet(user_id),
            GatewayCheck::NothingPending => screens::nothing_to_check(user_id),
        })
    }

    async fn approve_topup(&self, admin: UserId, code: &RequestCode) -> Result<Vec<Outgoing>> {
        Ok(match self.desk.approve_topup(admin, code).await? {
            TopupApproval::Approved {
                topup,
                balance_minor,
            } => vec![
                screens::admin_done(admin, format!("Заявка {code} зачислена.")),
                screens::user_topup_credited(&topup, balance_minor),
            ],
            TopupApproval::NotFound => vec![screens::already_handled(admin, code)],
        })
    }

    async fn reject_topup(&self, admin: UserId, code: &RequestCode) -> Result<Vec<Outgoing>> {
        Ok(match self.desk.reject_topup(admin, code).await? {
            Some(topup) => vec![
                screens::admin_done(admin, format!("Заявка {code} отклонена.")),
                screens::user_topup_rejected(&topup),
            ],
            None => vec![screens::already_handled(admin, code)],
        })
    }

    // ========================================================================
    // Orders
    // ========================================================================

    async fn purchase(&self, event: &Event, quantity: u32) -> Result<Vec<Outgoing>> {
        let user_id = event.user_id;
        if let Some(refusal) = self.check_gate(user_id).await {
            return Ok(vec![refusal]);
        }
        let recipient = event.recipient();

        if !self.desk.is_automatic() {
            let order = self.desk.place_order(user_id, quantity, &recipient).await?;
            let mut replies = vec![screens::order_filed(&order)];
            replies.extend(
                self.desk
                    .admins()
                    .iter()
                    .map(|admin| screens::admin_order_request(admin, &order, &recipient)),
            );
            return Ok(replies);
        }

        let reply = match self.desk.buy_now(user_id, quantity, &recipient).await? {
            Purchase::Delivered {
                quantity,
                price_minor,
                balance_minor,
                ..
            } => screens::delivered(user_id, quantity, &recipient, price_minor, balance_minor),
            Purchase::PaymentLink { url, .. } => screens::order_payment_link(user_id, &url),
            Purchase::Refunded {
                price_minor,
                balance_minor,
                ..
            } => screens::refunded(user_id, price_minor, balance_minor),
            Purchase::Insufficient {
                price_minor,
                shortfall_minor,
            } => screens::insufficient(user_id, quantity, price_minor, shortfall_minor),
        };
        Ok(vec![reply])
    }

    async fn approve_order(&self, admin: UserId, code: &RequestCode) -> Result<Vec<Outgoing>> {
        Ok(match self.desk.approve_order(admin, code).await? {
            OrderApproval::Approved {
                order,
                balance_minor,
            } => vec![
                screens::admin_done(admin, format!("Заказ {code} выполнен, оплата списана.")),
                screens::user_order_done(&order, balance_minor),
            ],
            OrderApproval::InsufficientFunds {
                order,
                shortfall_minor,
            } => vec![screens::order_lacks_funds(admin, &order, shortfall_minor)],
            OrderApproval::NotFound => vec![screens::already_handled(admin, code)],
        })
    }

    async fn reject_order(&self, admin: UserId, code: &RequestCode) -> Result<Vec<Outgoing>> {
        Ok(match self.desk.reject_order(admin, code).await? {
            Some(order) => vec![
                screens::admin_done(admin, format!("Заказ {code} отклонён.")),
                screens::user_order_rejected(&order),
            ],
            None => vec![screens::already_handled(admin, code)],
        })
    }

    async fn check_gate(&self, user_id: UserId) -> Option<Outgoing> {
        let gate = self.gate.as_ref()?;
        if gate.is_member(user_id).await {
            None
        } else {
            info!(user_id = %user_id, channel = gate.channel(), "Refused: not subscribed");
            Some(screens::subscribe_first(user_id, gate.channel()))
        }
    }
}

fn error_reply(user_id: UserId, err: &BillingError) -> Outgoing {
    match err {
        BillingError::Unauthorized { .. } => screens::not_allowed(user_id),
        BillingError::InvalidQuantity { min, max, .. } => screens::ask_quantity(user_id, *min, *max),
        BillingError::InvalidAmount(_) | BillingError::InvalidId(_) => {
            screens::invalid_number(user_id)
        }
        BillingError::ExternalService { service, message } => {
            error!(user_id = %user_id, service = %service, error = %message, "External service failed");
            screens::try_later(user_id)
        }
        other => {
            error!(user_id = %user_id, error = %other, "Event handling failed");
            screens::try_later(user_id)
        }
    }
}
