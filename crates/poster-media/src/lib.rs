//! # poster-media
//!
//! Local artifact storage and preview images.
//!
//! - [`FileStore`] keeps PDF artifacts and preview images in two sibling
//!   directories, addressed by [`ArtifactName`].
//! - [`PreviewGenerator`] produces a placeholder preview for a bare PDF, or
//!   shrinks and recompresses a preview rendered by the storefront.

mod error;
mod glyphs;
pub mod preview;
pub mod store;

pub use error::{MediaError, Result};
pub use preview::PreviewGenerator;
pub use store::{ArtifactName, FileStore};
