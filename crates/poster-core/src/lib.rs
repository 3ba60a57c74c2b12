//! # poster-core
//!
//! Domain primitives shared by every crate of the poster fulfillment backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────────────┐
//! │ Upload       │──▶│ ArtifactCatalog│◀──│ Fulfillment      │
//! │ Intake       │   │ (File Store)   │   │ Notifier         │
//! └──────────────┘   └────────────────┘   └────────┬─────────┘
//!                                                  │
//!                                         ┌────────▼─────────┐
//!                                         │ EmailSender      │
//!                                         │ (Strategy)       │
//!                                         └──────────────────┘
//! ```
//!
//! `CartItemId` is the only way to name a stored artifact: it can only be
//! built through [`CartItemId::parse`], so every filesystem path derived from
//! it has already passed the identifier pattern.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod error;

pub use cart::CartItemId;
pub use catalog::ArtifactCatalog;
pub use email::{EmailMessage, EmailSender};
pub use error::{Result, ShopError};
