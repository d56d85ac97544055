//! Button callback data.
//!
//! The front end echoes back the `data` of a pressed button; this is the
//! complete vocabulary.

use std::fmt;
use std::str::FromStr;

use starshop_core::RequestCode;

/// A pressed button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// Main menu.
    Menu,
    /// Balance and topup presets.
    Balance,
    /// Preset topup amount, whole rubles.
    TopupAmount(i64),
    /// Ask for a custom topup amount.
    TopupCustom,
    /// Pay the selected amount by bank transfer.
    PaySbp,
    /// Pay the selected amount with TON through the gateway.
    PayTon,
    /// Pay the selected amount with USDT through the gateway.
    PayUsdt,
    /// The user says the bank transfer is done.
    PaidSbp,
    /// Check the pending gateway invoice.
    CheckCrypto,
    /// Star quantity presets.
    BuyMenu,
    /// Buy a preset quantity.
    Buy(u32),
    /// Ask for a custom quantity.
    Custom,
    /// Admin: credit a manual topup.
    TopupOk(RequestCode),
    /// Admin: reject a manual topup.
    TopupNo(RequestCode),
    /// Admin: change the amount of a manual topup.
    TopupEdit(RequestCode),
    /// Admin: approve an order.
    OrderOk(RequestCode),
    /// Admin: reject an order.
    OrderNo(RequestCode),
}

/// Callback data that is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown callback: {0}")]
pub struct UnknownCallback(pub String);

impl FromStr for Callback {
    type Err = UnknownCallback;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(data.to_string());

        let parsed = match data.split_once(':') {
            None => match data {
                "menu" => Self::Menu,
                "balance" => Self::Balance,
                "topup_custom" => Self::TopupCustom,
                "pay_sbp" => Self::PaySbp,
                "pay_ton" => Self::PayTon,
                "pay_usdt" => Self::PayUsdt,
                "check_crypto" => Self::CheckCrypto,
                "buy_menu" => Self::BuyMenu,
                "custom" => Self::Custom,
                _ => return Err(unknown()),
            },
            Some(("paid", "sbp")) => Self::PaidSbp,
            Some(("topup_amount", amount)) => {
                Self::TopupAmount(amount.parse().map_err(|_| unknown())?)
            }
            Some(("buy", quantity)) => Self::Buy(quantity.parse().map_err(|_| unknown())?),
            Some((action, code)) => {
                let code: RequestCode = code.parse().map_err(|_| unknown())?;
                match action {
                    "topup_ok" => Self::TopupOk(code),
                    "topup_no" => Self::TopupNo(code),
                    "topup_edit" => Self::TopupEdit(code),
                    "order_ok" => Self::OrderOk(code),
                    "order_no" => Self::OrderNo(code),
                    _ => return Err(unknown()),
                }
            }
        };
        Ok(parsed)
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Menu => f.write_str("menu"),
            Self::Balance => f.write_str("balance"),
            Self::TopupAmount(amount) => write!(f, "topup_amount:{amount}"),
            Self::TopupCustom => f.write_str("topup_custom"),
            Self::PaySbp => f.write_str("pay_sbp"),
            Self::PayTon => f.write_str("pay_ton"),
            Self::PayUsdt => f.write_str("pay_usdt"),
            Self::PaidSbp => f.write_str("paid:sbp"),
            Self::CheckCrypto => f.write_str("check_crypto"),
            Self::BuyMenu => f.write_str("buy_menu"),
            Self::Buy(quantity) => write!(f, "buy:{quantity}"),
            Self::Custom => f.write_str("custom"),
            Self::TopupOk(code) => write!(f, "topup_ok:{code}"),
            Self::TopupNo(code) => write!(f, "topup_no:{code}"),
            Self::TopupEdit(code) => write!(f, "topup_edit:{code}"),
            Self::OrderOk(code) => write!(f, "order_ok:{code}"),
            Self::OrderNo(code) => write!(f, "order_no:{code}"),
        }
    }
}
