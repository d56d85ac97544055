//! Durable storage layer for starshop.
//!
//! This crate provides the persistence primitive and the stateful components
//! built on top of it.
//!
//! # Architecture
//!
//! Every concern lives in one JSON document, written atomically through a
//! [`DocumentStore`]:
//!
//! - `balances`: balances per user plus the ledger journal
//! - `stats`: lifetime counters per user
//! - `manual_topups`: pending manual-transfer topups, keyed by code
//! - `orders`: pending purchase orders, keyed by code
//! - `settings`: unit price and unit cost
//!
//! Each component owns its state, loads its document when opened and saves
//! after every mutation. [`Books`] bundles the components and implements the
//! operations that touch several documents, in a write order that survives a
//! crash between any two writes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use starshop_core::{Pricing, UserId};
//! use starshop_store::{Books, FileStore};
//!
//! let store = Arc::new(FileStore::open("/tmp/starshop").unwrap());
//! let books = Books::open(store, Pricing::default());
//!
//! let balance = books.ledger().balance(UserId::new(42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod books;
pub mod document;
pub mod error;
pub mod ledger;
pub mod orders;
pub mod schema;
pub mod settings;
pub mod stats;
pub mod topups;

pub use books::{AutoCharge, AutoOrder, Books, GatewaySettlement, OrderApproval, TopupApproval};
pub use document::{load_document, save_document, DocumentStore, FileStore, MemoryStore};
pub use error::{Result, StoreError};
pub use ledger::{Debit, Ledger, Refund};
pub use orders::OrderTracker;
pub use settings::Settings;
pub use stats::StatsBook;
pub use topups::TopupTracker;
