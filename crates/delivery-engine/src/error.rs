//! Error types for delivery operations.

use thiserror::Error;

/// Errors that can occur while delivering to one integration.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The stored integration config is missing a required field.
    #[error("invalid integration config: {0}")]
    Config(String),

    /// An inbound envelope was malformed.
    #[error("{0}")]
    Validation(String),

    /// Recipient address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// SMTP transport setup or send failed.
    #[error("smtp error: {0}")]
    Smtp(String),

    /// Message construction failed.
    #[error("failed to build message: {0}")]
    BuildMessage(String),

    /// HTTP call to the integration failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database bookkeeping failed.
    #[error("database error: {0}")]
    Database(#[from] database::DatabaseError),
}
