//! Core types and utilities for starshop.
//!
//! This crate provides the foundational types used throughout the starshop bot:
//!
//! - **Identifiers**: `UserId`, `RequestCode`, `EntryId`, `CodeBook`
//! - **Pricing**: `Pricing`, `Limits`, minor-unit formatting and parsing
//! - **Ledger**: `LedgerEntry`, `EntryKind`
//! - **Requests**: `GatewayTopup`, `ManualTopup`, `PurchaseOrder`
//! - **Stats**: `LifetimeStats`, `StatsSummary`
//! - **Conversation**: `InputMode`, `Session`, `Event`, `Outgoing`
//!
//! # Money
//!
//! **All balances are kept in minor units (kopecks).**
//!
//! - User tops up 500 RUB → balance grows by 50 000
//! - 100 stars at 1.50 RUB → 15 000 is debited
//! - Stored as `i64` to avoid floating point drift; unit prices are
//!   `rust_decimal::Decimal` and are floored to the kopeck when quoted

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod codes;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod messages;
pub mod pricing;
pub mod requests;
pub mod session;
pub mod stats;

pub use codes::{CodeBook, CodeKind};
pub use error::{BillingError, Result};
pub use ids::{EntryId, IdError, RequestCode, UserId, REQUEST_CODE_LEN};
pub use ledger::{EntryKind, LedgerEntry};
pub use messages::{Action, Event, EventKind, Outgoing};
pub use pricing::{
    decimal_to_minor, format_minor, major_to_minor, parse_major, Limits, Pricing, MINOR_PER_MAJOR,
};
pub use requests::{GatewayAsset, GatewayTopup, ManualTopup, PurchaseOrder};
pub use session::{InputMode, Session};
pub use stats::{LifetimeStats, StatsSummary};
