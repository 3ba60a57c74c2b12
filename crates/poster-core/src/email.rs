//! Email Provider Strategy Pattern
//!
//! Defines the narrow interface the fulfillment pipeline needs from a
//! transactional email provider, so tests can substitute a fake without a
//! network boundary.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poster_core::{EmailMessage, EmailSender};
//!
//! let sender: Arc<dyn EmailSender> = Arc::new(ResendSender::from_config(config)?);
//! let id = sender.send(&message).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A composed, ready-to-send email
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient address
    pub to: String,

    /// Subject line
    pub subject: String,

    /// HTML body
    pub html: String,
}

/// Transactional email provider
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Provider name (for logging)
    fn name(&self) -> &str;

    /// Submit a message; returns the provider's message id
    async fn send(&self, message: &EmailMessage) -> Result<String>;
}
