//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Cart payload failed validation; one entry per violation
    #[error("Invalid line items: {}", .0.join("; "))]
    InvalidLineItems(Vec<String>),

    /// Session id is not a checkout session id
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Processed-event ledger failure
    #[error("Event ledger error: {0}")]
    Ledger(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for PaymentError {
    fn from(err: std::io::Error) -> Self {
        Self::Ledger(err.to_string())
    }
}
