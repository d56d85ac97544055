//! Error types for starshop storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store refused the write.
    #[error("write rejected for document {0}")]
    WriteRejected(String),
}

impl From<StoreError> for starshop_core::BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(msg) => Self::Serialization(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}
