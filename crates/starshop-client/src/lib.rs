//! Starshop Client SDK.
//!
//! Front ends use this crate to forward chat events to the starshop service
//! and collect the messages they should render.
//!
//! # Example
//!
//! ```no_run
//! use starshop_client::StarshopClient;
//! use starshop_core::{Event, UserId};
//!
//! # async fn example() -> Result<(), starshop_client::ClientError> {
//! let client = StarshopClient::new("http://starshop:8080", "your-service-api-key")?;
//!
//! let event = Event::text(UserId::new(42), "/start").with_username("alice");
//! for message in client.send_event(&event).await? {
//!     println!("to {}: {}", message.user_id, message.text);
//! }
//!
//! // Notifications queued by webhooks between events
//! let pending = client.poll_outbox().await?;
//! println!("{} queued notifications", pending.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;

pub use client::{ClientOptions, HealthStatus, StarshopClient};
pub use error::ClientError;
