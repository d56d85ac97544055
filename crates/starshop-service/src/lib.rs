//! Starshop order desk and HTTP event API.
//!
//! This crate runs the bot behind a messaging front end:
//!
//! - The order desk: topups, orders, admin approvals
//! - The conversation dispatcher that turns events into replies
//! - Collaborators: Crypto Pay, the fulfillment executor, the channel gate
//! - The HTTP surface the front end and Crypto Pay talk to
//!
//! # Authentication
//!
//! The front end authenticates with a service API key (`X-API-Key`). Crypto
//! Pay webhooks are verified by signature. Who is an admin is decided here,
//! from `ADMIN_IDS`, never by the front end.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for the router

pub mod auth;
pub mod bot;
pub mod config;
pub mod crypto;
pub mod desk;
pub mod error;
pub mod fulfillment;
pub mod gateway;
pub mod handlers;
pub mod membership;
pub mod outbox;
pub mod routes;
pub mod state;

pub use bot::Dispatcher;
pub use config::{ConfigError, FulfillmentMode, ServiceConfig};
pub use desk::{Admins, Desk};
pub use error::ApiError;
pub use fulfillment::{FulfillmentExecutor, FulfillmentOutcome, HttpFulfillmentExecutor};
pub use gateway::{CryptoPayClient, PaymentGateway};
pub use membership::{SubscriptionGate, TelegramGate};
pub use routes::create_router;
pub use state::{AppState, Collaborators};
