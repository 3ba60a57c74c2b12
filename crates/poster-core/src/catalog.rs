//! Artifact Catalog
//!
//! Read-only view of stored artifacts, used by fulfillment to decide which
//! items get an inline preview thumbnail.

use crate::cart::CartItemId;

/// Lookup over stored artifact previews
pub trait ArtifactCatalog: Send + Sync {
    /// Whether a preview image exists for this item
    fn has_preview(&self, id: &CartItemId) -> bool;
}
