//! Error types for starshop.

use crate::ids::{IdError, UserId};

/// Result type for starshop operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in ledger and workflow operations.
///
/// Expected outcomes such as insufficient funds at order approval or an
/// already-handled code are not errors; they are reported through the outcome
/// enums of the operations that produce them.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// The acting user is not an administrator.
    #[error("user {user_id} is not an administrator")]
    Unauthorized {
        /// The user that attempted the transition.
        user_id: UserId,
    },

    /// The ledger already holds an entry of this kind for the reference.
    #[error("already settled: {reference}")]
    AlreadySettled {
        /// The request or order code.
        reference: String,
    },

    /// Quantity outside the configured bounds.
    #[error("quantity {quantity} outside {min}..={max}")]
    InvalidQuantity {
        /// Requested quantity.
        quantity: u32,
        /// Smallest allowed quantity.
        min: u32,
        /// Largest allowed quantity.
        max: u32,
    },

    /// Invalid amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// External service error (payment gateway, fulfillment, membership).
    #[error("external service error: {service} - {message}")]
    ExternalService {
        /// The service that failed.
        service: String,
        /// Error message.
        message: String,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BillingError {
    /// Build an external service error.
    pub fn external(service: &str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            message: message.into(),
        }
    }
}
