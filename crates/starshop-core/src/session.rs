//! Per-user conversational input mode.
//!
//! Free-form text means different things depending on what the bot last asked
//! for. The mode is explicit so the set of valid next inputs is always known.

use serde::{Deserialize, Serialize};

use crate::RequestCode;

/// What the bot is waiting for from a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InputMode {
    /// Nothing; text is treated as a command or ignored.
    #[default]
    Idle,

    /// A custom topup amount in whole rubles.
    AwaitingTopupAmount,

    /// A custom star quantity.
    AwaitingQuantity,

    /// A corrected amount for a pending manual topup (admins only).
    AwaitingAmendedAmount {
        /// The request being amended.
        code: RequestCode,
    },
}

impl InputMode {
    /// Whether the next message is expected to be a number.
    #[must_use]
    pub const fn expects_number(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Conversational state of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    mode: InputMode,
    selected_topup_minor: Option<i64>,
}

impl Session {
    /// Current input mode.
    #[must_use]
    pub const fn mode(&self) -> &InputMode {
        &self.mode
    }

    /// Ask for a custom topup amount.
    pub fn await_topup_amount(&mut self) {
        self.mode = InputMode::AwaitingTopupAmount;
    }

    /// Ask for a custom star quantity.
    pub fn await_quantity(&mut self) {
        self.mode = InputMode::AwaitingQuantity;
    }

    /// Ask an admin for a corrected topup amount.
    pub fn await_amended_amount(&mut self, code: RequestCode) {
        self.mode = InputMode::AwaitingAmendedAmount { code };
    }

    /// Remember the topup amount the user picked and return to idle.
    pub fn select_topup(&mut self, amount_minor: i64) {
        self.selected_topup_minor = Some(amount_minor);
        self.mode = InputMode::Idle;
    }

    /// Topup amount picked before choosing a payment rail.
    #[must_use]
    pub const fn selected_topup(&self) -> Option<i64> {
        self.selected_topup_minor
    }

    /// Forget the selected topup amount once a request was opened for it.
    pub fn clear_topup(&mut self) -> Option<i64> {
        self.selected_topup_minor.take()
    }

    /// Leave the current mode, returning it.
    pub fn take_mode(&mut self) -> InputMode {
        std::mem::take(&mut self.mode)
    }
}
