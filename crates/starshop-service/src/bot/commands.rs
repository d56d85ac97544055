//! Slash commands.

use rust_decimal::Decimal;
use starshop_core::{parse_major, UserId};

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Greeting and main menu.
    Start,
    /// Admin: price per star.
    SetPrice(Decimal),
    /// Admin: cost per star.
    SetCost(Decimal),
    /// Admin: totals and margin.
    Stats,
    /// Admin: check the subscription channel.
    CheckGate,
    /// Admin: overwrite a balance from a backup.
    RestoreBalance {
        /// Whose balance.
        user_id: UserId,
        /// New balance in rubles.
        amount: Decimal,
    },
    /// A known command with malformed arguments.
    Usage(&'static str),
}

impl Command {
    /// Parse a slash command. Returns `None` for anything that is not one of
    /// ours, including plain text.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        // `/stats@shop_bot` in group chats
        let name = head.split('@').next().unwrap_or(head);
        let args: Vec<&str> = parts.collect();

        let command = match name {
            "start" => Self::Start,
            "stats" => Self::Stats,
            "check_gate" => Self::CheckGate,
            "set_price" => single_decimal(&args)
                .map_or(Self::Usage("/set_price 3.50"), Self::SetPrice),
            "set_cost" => single_decimal(&args)
                .map_or(Self::Usage("/set_cost 3.10"), Self::SetCost),
            "restore_balance" => match args.as_slice() {
                [user, amount] => match (user.parse(), parse_major(amount)) {
                    (Ok(user_id), Ok(amount)) => Self::RestoreBalance { user_id, amount },
                    _ => Self::Usage("/restore_balance <user_id> <сумма ₽>"),
                },
                _ => Self::Usage("/restore_balance <user_id> <сумма ₽>"),
            },
            _ => return None,
        };
        Some(command)
    }

    /// Whether only admins may run the command.
    #[must_use]
    pub const fn is_admin_only(&self) -> bool {
        !matches!(self, Self::Start)
    }
}

fn single_decimal(args: &[&str]) -> Option<Decimal> {
    match args {
        [value] => parse_major(value).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/stats@shop_bot"), Some(Command::Stats));
        assert_eq!(
            Command::parse("/set_price 3,50"),
            Some(Command::SetPrice(dec!(3.50)))
        );
        assert_eq!(
            Command::parse("/restore_balance 1001 450.50"),
            Some(Command::RestoreBalance {
                user_id: UserId::new(1001),
                amount: dec!(450.50)
            })
        );
    }

    #[test]
    fn malformed_arguments_yield_usage() {
        assert!(matches!(Command::parse("/set_cost"), Some(Command::Usage(_))));
        assert!(matches!(
            Command::parse("/restore_balance alice 10"),
            Some(Command::Usage(_))
        ));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(Command::parse("750"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
    }
}
