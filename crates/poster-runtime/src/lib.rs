//! # poster-runtime
//!
//! Runtime providers for the poster backend.
//!
//! ## Providers
//!
//! - **Resend** (default): transactional email over the Resend HTTP API
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poster_runtime::{ResendConfig, ResendSender};
//!
//! let sender = ResendSender::from_config(ResendConfig {
//!     api_key: settings.api_key.clone(),
//!     ..Default::default()
//! })?;
//! let notifier = FulfillmentNotifier::new(Arc::new(sender), links);
//! ```

#[cfg(feature = "resend")]
pub mod resend;

#[cfg(feature = "resend")]
pub use resend::{ResendConfig, ResendSender};

// Re-export core types for convenience
pub use poster_core::{EmailMessage, EmailSender, Result, ShopError};
