//! Application state.

use std::sync::Arc;

use starshop_store::{Books, DocumentStore};

use crate::bot::Dispatcher;
use crate::config::{FulfillmentMode, ServiceConfig};
use crate::desk::{Admins, Desk};
use crate::fulfillment::{FulfillmentExecutor, HttpFulfillmentExecutor};
use crate::gateway::{CryptoPayClient, PaymentGateway};
use crate::membership::{SubscriptionGate, TelegramGate};
use crate::outbox::Outbox;

/// External collaborators of the desk and dispatcher.
///
/// Built from configuration by [`Collaborators::from_config`]; tests pass
/// their own fakes.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Crypto payment gateway.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    /// Automatic star delivery.
    pub executor: Option<Arc<dyn FulfillmentExecutor>>,
    /// Channel-subscription gate.
    pub gate: Option<Arc<dyn SubscriptionGate>>,
}

impl Collaborators {
    /// Build the HTTP collaborators the configuration asks for.
    ///
    /// A collaborator that cannot be built is logged and left out.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        let gateway = config.cryptopay_api_token.as_ref().and_then(|token| {
            match CryptoPayClient::new(&config.cryptopay_api_url, token.clone()) {
                Ok(client) => {
                    tracing::info!(api_url = %config.cryptopay_api_url, "Crypto Pay integration enabled");
                    Some(Arc::new(client) as Arc<dyn PaymentGateway>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Crypto Pay client");
                    None
                }
            }
        });
        if gateway.is_none() {
            tracing::warn!("Crypto Pay not configured - TON/USDT topups will not be available");
        }

        let executor = match (config.fulfillment_mode, config.fulfillment_url.as_deref()) {
            (FulfillmentMode::Automatic, Some(url)) => match HttpFulfillmentExecutor::new(url) {
                Ok(executor) => {
                    tracing::info!(fulfillment_url = %url, "Automatic fulfillment enabled");
                    Some(Arc::new(executor) as Arc<dyn FulfillmentExecutor>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create fulfillment executor");
                    None
                }
            },
            _ => {
                tracing::info!("Manual fulfillment - orders wait for admin approval");
                None
            }
        };

        let gate = config.subscription_channel.as_ref().and_then(|channel| {
            match TelegramGate::new(&config.telegram_api_url, config.bot_token.clone(), channel.clone()) {
                Ok(gate) => {
                    tracing::info!(channel = %channel, "Subscription gate enabled");
                    Some(Arc::new(gate) as Arc<dyn SubscriptionGate>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create subscription gate");
                    None
                }
            }
        });

        Self {
            gateway,
            executor,
            gate,
        }
    }
}

/// Application state shared across handlers.
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// The order desk.
    pub desk: Arc<Desk>,

    /// Conversation dispatcher.
    pub dispatcher: Dispatcher,

    /// Notifications waiting for the front end.
    pub outbox: Outbox,
}

impl AppState {
    /// Open the books and wire up the collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: ServiceConfig,
        collaborators: Collaborators,
    ) -> Self {
        let books = Books::open(store, config.pricing.clone());
        let mut desk = Desk::new(
            books,
            Admins::new(config.admin_ids.iter().copied()),
            config.limits.clone(),
        );
        if let Some(gateway) = collaborators.gateway {
            desk = desk.with_gateway(gateway);
        }
        if let Some(executor) = collaborators.executor {
            desk = desk.with_executor(executor);
        }
        let desk = Arc::new(desk);

        let mut dispatcher = Dispatcher::new(desk.clone(), config.sbp_instruction.clone());
        if let Some(gate) = collaborators.gate {
            dispatcher = dispatcher.with_gate(gate);
        }

        if config.admin_ids.is_empty() {
            tracing::warn!("ADMIN_IDS is empty - manual topups and orders cannot be approved");
        }

        Self {
            config,
            desk,
            dispatcher,
            outbox: Outbox::default(),
        }
    }
}
