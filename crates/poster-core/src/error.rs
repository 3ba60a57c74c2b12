//! Error Types

use thiserror::Error;

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Domain error types
#[derive(Error, Debug)]
pub enum ShopError {
    /// Identifier does not match `cart-<digits>-<hex>`
    #[error("Invalid cart item id: {0}")]
    InvalidCartItemId(String),

    /// Email provider rejected or failed the request
    #[error("Email provider error: {0}")]
    Email(String),

    /// Email provider could not be reached
    #[error("Email provider unavailable: {0}")]
    EmailUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShopError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::EmailUnavailable(_) | Self::Io(_))
    }
}
