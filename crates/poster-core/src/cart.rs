//! Cart Item Identifiers
//!
//! A cart item id names one personalized poster from upload to download.
//! It is generated by the storefront as `cart-<millis>-<hex>` and travels
//! through the payment provider as product metadata.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShopError};

/// Metadata key under which the id travels through the payment provider
pub const METADATA_KEY: &str = "cartItemId";

/// Suffix appended to an artifact stem to name its preview image
pub const PREVIEW_SUFFIX: &str = "-preview.jpg";

static CART_ITEM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^cart-[0-9]+-[a-f0-9]+$").expect("static regex"));

/// Validated cart item identifier (formatted: cart-<digits>-<hex>)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CartItemId(String);

impl CartItemId {
    /// Parse and validate an identifier
    pub fn parse(raw: &str) -> Result<Self> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ShopError::InvalidCartItemId(raw.to_string()))
        }
    }

    /// Check a raw string against the identifier pattern
    pub fn is_valid(raw: &str) -> bool {
        CART_ITEM_ID.is_match(raw)
    }

    /// Get the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the stored PDF artifact
    pub fn pdf_file_name(&self) -> String {
        format!("{}.pdf", self.0)
    }

    /// File name of the stored preview image
    pub fn preview_file_name(&self) -> String {
        format!("{}{PREVIEW_SUFFIX}", self.0)
    }

    /// Short human-readable label, used for download file names
    pub fn short_label(&self) -> &str {
        let hex = self.0.rsplit('-').next().unwrap_or(&self.0);
        &hex[..hex.len().min(8)]
    }
}

impl std::fmt::Display for CartItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CartItemId {
    type Error = ShopError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CartItemId> for String {
    fn from(id: CartItemId) -> Self {
        id.0
    }
}

impl std::str::FromStr for CartItemId {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(CartItemId::is_valid("cart-1700000000000-a1b2c3"));
        assert!(CartItemId::is_valid("cart-1-0"));
    }

    #[test]
    fn test_rejects_traversal_and_malformed() {
        for raw in [
            "",
            "cart-",
            "cart-123-",
            "cart-abc-a1b2",
            "cart-123-A1B2",
            "cart-123-xyz",
            "../cart-123-abc",
            "cart-123-abc/../../etc/passwd",
            "cart-123-abc.pdf",
            " cart-123-abc",
            "cart-123-abc\n",
            "cart-١٢٣-ab",
            "cart-１２３-ab",
        ] {
            assert!(CartItemId::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_file_names() {
        let id = CartItemId::parse("cart-1700000000000-deadbeefcafe").unwrap();
        assert_eq!(id.pdf_file_name(), "cart-1700000000000-deadbeefcafe.pdf");
        assert_eq!(
            id.preview_file_name(),
            "cart-1700000000000-deadbeefcafe-preview.jpg"
        );
        assert_eq!(id.short_label(), "deadbeef");
    }

    #[test]
    fn test_serde_validates() {
        let id: CartItemId = serde_json::from_str("\"cart-42-ff\"").unwrap();
        assert_eq!(id.as_str(), "cart-42-ff");
        assert!(serde_json::from_str::<CartItemId>("\"../secret\"").is_err());
    }
}
