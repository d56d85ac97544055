//! Service configuration.

use std::collections::BTreeSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use starshop_core::{Limits, Pricing, UserId};

use crate::fulfillment::EXECUTOR_TIMEOUT;

/// Configuration errors. Only these abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A mandatory variable is not set.
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("{name} has an invalid value: {value}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

/// How purchase orders are fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentMode {
    /// Charge and call the fulfillment executor immediately.
    Automatic,
    /// Queue the order for an admin to approve.
    Manual,
}

/// Service configuration loaded from environment variables and secrets files.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Directory holding the JSON documents (default: "data").
    pub data_dir: String,

    /// Telegram bot token. Mandatory.
    pub bot_token: String,

    /// Users allowed to approve, reject and amend.
    pub admin_ids: BTreeSet<UserId>,

    /// Starting unit price and cost, until an admin changes them.
    pub pricing: Pricing,

    /// Quantity and topup bounds.
    pub limits: Limits,

    /// Bank-transfer instructions shown to the user.
    pub sbp_instruction: String,

    /// Crypto Pay API base URL.
    pub cryptopay_api_url: String,

    /// Crypto Pay API token (optional; crypto rails are off without it).
    pub cryptopay_api_token: Option<String>,

    /// How orders are fulfilled.
    pub fulfillment_mode: FulfillmentMode,

    /// Base URL of the fulfillment executor.
    pub fulfillment_url: Option<String>,

    /// Channel users must join before paying (`@name`).
    pub subscription_channel: Option<String>,

    /// Telegram Bot API base URL.
    pub telegram_api_url: String,

    /// Service API key the messaging front end must present.
    pub service_api_key: Option<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds. Must exceed the fulfillment executor's
    /// timeout so an automatic order is answered before the request expires.
    pub request_timeout_seconds: u64,
}

/// Crypto Pay secrets file structure.
#[derive(Debug, Deserialize)]
struct CryptoPaySecrets {
    api_token: String,
    #[serde(default)]
    api_url: Option<String>,
}

const DEFAULT_CRYPTOPAY_API_URL: &str = "https://pay.crypt.bot/api";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_SBP_INSTRUCTION: &str =
    "Отсканируйте QR СБП или переведите по реквизитам. После оплаты нажмите «Я оплатил».";

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    ///
    /// # Errors
    ///
    /// Returns an error if `BOT_TOKEN` is missing or a variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secrets = load_cryptopay_secrets();
        Self::from_lookup(|name| std::env::var(name).ok(), secrets)
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Values in `secrets` take precedence over `CRYPTOPAY_API_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `BOT_TOKEN` is missing or a variable is malformed.
    fn from_lookup<F>(lookup: F, secrets: Option<CryptoPaySecrets>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let admin_ids = match var("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => BTreeSet::new(),
        };

        let defaults = Pricing::default();
        let pricing = Pricing {
            unit_price: parse_decimal(&var, "USER_PRICE_PER_STAR_RUB")?.unwrap_or(defaults.unit_price),
            unit_cost: parse_decimal(&var, "COST_PER_STAR_RUB")?.unwrap_or(defaults.unit_cost),
        };

        let (cryptopay_api_url, cryptopay_api_token) = match secrets {
            Some(secrets) => (
                secrets
                    .api_url
                    .unwrap_or_else(|| DEFAULT_CRYPTOPAY_API_URL.into()),
                Some(secrets.api_token),
            ),
            None => (
                var("CRYPTOPAY_API_URL").unwrap_or_else(|| DEFAULT_CRYPTOPAY_API_URL.into()),
                var("CRYPTOPAY_API_TOKEN"),
            ),
        };

        let fulfillment_url = var("FULFILLMENT_URL");
        let fulfillment_mode = match var("FULFILLMENT_MODE").as_deref() {
            Some("automatic") => FulfillmentMode::Automatic,
            Some("manual") => FulfillmentMode::Manual,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "FULFILLMENT_MODE",
                    value: other.to_string(),
                })
            }
            None if fulfillment_url.is_some() => FulfillmentMode::Automatic,
            None => FulfillmentMode::Manual,
        };
        if fulfillment_mode == FulfillmentMode::Automatic && fulfillment_url.is_none() {
            return Err(ConfigError::Missing("FULFILLMENT_URL"));
        }

        let subscription_channel = var("SUBSCRIPTION_CHANNEL").map(|channel| {
            if channel.starts_with('@') {
                channel
            } else {
                format!("@{channel}")
            }
        });

        let request_timeout_seconds = parse_number(&var, "REQUEST_TIMEOUT_SECONDS")?.unwrap_or(900);
        if request_timeout_seconds <= EXECUTOR_TIMEOUT.as_secs() {
            return Err(ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECONDS",
                value: request_timeout_seconds.to_string(),
            });
        }

        Ok(Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            data_dir: var("DATA_DIR").unwrap_or_else(|| "data".into()),
            bot_token,
            admin_ids,
            pricing,
            limits: Limits::default(),
            sbp_instruction: var("SBP_INSTRUCTION").unwrap_or_else(|| DEFAULT_SBP_INSTRUCTION.into()),
            cryptopay_api_url,
            cryptopay_api_token,
            fulfillment_mode,
            fulfillment_url,
            subscription_channel,
            telegram_api_url: var("TELEGRAM_API_URL").unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.into()),
            service_api_key: var("SERVICE_API_KEY"),
            max_body_bytes: parse_number(&var, "MAX_BODY_BYTES")?.unwrap_or(64 * 1024),
            request_timeout_seconds,
        })
    }
}

fn parse_admin_ids(raw: &str) -> Result<BTreeSet<UserId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<UserId>().map_err(|_| ConfigError::Invalid {
                name: "ADMIN_IDS",
                value: part.to_string(),
            })
        })
        .collect()
}

fn parse_decimal<F>(var: &F, name: &'static str) -> Result<Option<Decimal>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            starshop_core::parse_major(&value).map_err(|_| ConfigError::Invalid { name, value })
        })
        .transpose()
}

fn parse_number<F, T>(var: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    var(name)
        .map(|value| value.parse().map_err(|_| ConfigError::Invalid { name, value }))
        .transpose()
}

/// Load Crypto Pay secrets from the first secrets file found.
fn load_cryptopay_secrets() -> Option<CryptoPaySecrets> {
    let secret_paths = [".secrets/cryptopay.json", "../.secrets/cryptopay.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<CryptoPaySecrets>(path) {
            tracing::info!(path = %path, "Loaded Crypto Pay secrets from file");
            return Some(secrets);
        }
    }

    tracing::debug!("Crypto Pay secrets file not found, using environment variables");
    None
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "data".into(),
            bot_token: String::new(),
            admin_ids: BTreeSet::new(),
            pricing: Pricing::default(),
            limits: Limits::default(),
            sbp_instruction: DEFAULT_SBP_INSTRUCTION.into(),
            cryptopay_api_url: DEFAULT_CRYPTOPAY_API_URL.into(),
            cryptopay_api_token: None,
            fulfillment_mode: FulfillmentMode::Manual,
            fulfillment_url: None,
            subscription_channel: None,
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.into(),
            service_api_key: None,
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 900,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned(), None)
    }

    #[test]
    fn bot_token_is_mandatory() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("BOT_TOKEN"))));
        assert!(matches!(
            load(&[("BOT_TOKEN", "  ")]),
            Err(ConfigError::Missing("BOT_TOKEN"))
        ));
    }

    #[test]
    fn defaults_with_token_only() {
        let config = load(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.fulfillment_mode, FulfillmentMode::Manual);
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.pricing, Pricing::default());
        assert_eq!(config.cryptopay_api_url, DEFAULT_CRYPTOPAY_API_URL);
    }

    #[test]
    fn parses_admins_prices_and_channel() {
        let config = load(&[
            ("BOT_TOKEN", "123:abc"),
            ("ADMIN_IDS", "1, 2,,3"),
            ("USER_PRICE_PER_STAR_RUB", "1,60"),
            ("COST_PER_STAR_RUB", "1.40"),
            ("SUBSCRIPTION_CHANNEL", "starshop_news"),
        ])
        .unwrap();

        assert_eq!(config.admin_ids.len(), 3);
        assert!(config.admin_ids.contains(&UserId::new(2)));
        assert_eq!(config.pricing.unit_price, dec!(1.60));
        assert_eq!(config.pricing.unit_cost, dec!(1.40));
        assert_eq!(config.subscription_channel.as_deref(), Some("@starshop_news"));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "1,abc")]),
            Err(ConfigError::Invalid { name: "ADMIN_IDS", .. })
        ));
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("FULFILLMENT_MODE", "sometimes")]),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn automatic_mode_needs_an_executor() {
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("FULFILLMENT_MODE", "automatic")]),
            Err(ConfigError::Missing("FULFILLMENT_URL"))
        ));

        let config = load(&[("BOT_TOKEN", "t"), ("FULFILLMENT_URL", "http://exec:9000")]).unwrap();
        assert_eq!(config.fulfillment_mode, FulfillmentMode::Automatic);
    }

    #[test]
    fn request_timeout_must_outlast_the_executor() {
        assert!(matches!(
            load(&[("BOT_TOKEN", "t"), ("REQUEST_TIMEOUT_SECONDS", "600")]),
            Err(ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECONDS",
                ..
            })
        ));

        let config = load(&[("BOT_TOKEN", "t"), ("REQUEST_TIMEOUT_SECONDS", "660")]).unwrap();
        assert_eq!(config.request_timeout_seconds, 660);
    }

    #[test]
    fn secrets_file_wins_over_environment() {
        let secrets = CryptoPaySecrets {
            api_token: "from-file".into(),
            api_url: None,
        };
        let config = ServiceConfig::from_lookup(
            |name| match name {
                "BOT_TOKEN" => Some("t".into()),
                "CRYPTOPAY_API_TOKEN" => Some("from-env".into()),
                _ => None,
            },
            Some(secrets),
        )
        .unwrap();
        assert_eq!(config.cryptopay_api_token.as_deref(), Some("from-file"));
    }
}
