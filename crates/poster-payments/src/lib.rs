//! # poster-payments
//!
//! Hosted checkout, webhook authentication and order fulfillment for the
//! poster storefront.
//!
//! ## Checkout Flow
//!
//! The storefront never touches card data. It posts the cart here, gets a
//! Stripe-hosted page back and redirects the buyer to it:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Storefront │────▶│  Stripe Hosted  │────▶│  Storefront │
//! │   (cart)    │     │  Checkout Page  │     │  (success)  │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!                              │
//!                              │ checkout.session.completed
//!                              ▼
//!                     ┌─────────────────┐     ┌─────────────┐
//!                     │ WebhookHandler  │────▶│    Email    │
//!                     │ verify + dedupe │     │  (links to  │
//!                     └─────────────────┘     │  /download) │
//!                                             └─────────────┘
//! ```
//!
//! Every line item carries its `cartItemId` in product metadata; that id is
//! the only link between a payment and the uploaded PDF.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poster_payments::{StripeClient, WebhookHandler, MemoryEventLedger};
//!
//! let stripe = Arc::new(StripeClient::new("sk_test_xxx", "whsec_xxx"));
//! let handler = WebhookHandler::new(stripe, catalog, Arc::new(MemoryEventLedger::new()), notifier);
//!
//! let event = handler.parse_event(&body, &signature_header)?;
//! let outcome = handler.handle(event).await;
//! ```

mod checkout;
mod error;
mod ledger;
mod notify;
mod provider;
pub mod signature;
mod webhook;

pub use checkout::{LineItem, SESSION_ID_PLACEHOLDER, StripeClient, validate_line_items};
pub use error::{PaymentError, Result};
pub use ledger::{Claim, DEFAULT_RETENTION_SECS, EventLedger, FileEventLedger, MemoryEventLedger};
pub use notify::{
    FulfillmentNotifier, LinkBuilder, OrderItem, OrderSummary, format_amount, order_reference,
};
pub use provider::{
    CHECKOUT_COMPLETED, CreatedSession, PaymentProvider, PaymentStatus, ProviderEvent,
    PurchasedItem, SessionRequest, SessionSnapshot,
};
pub use webhook::{SkipReason, WebhookHandler, WebhookOutcome};
