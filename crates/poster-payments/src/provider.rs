//! Payment Provider Strategy Pattern
//!
//! The fulfillment pipeline only needs three things from a payment provider:
//! create a hosted session, authenticate a webhook delivery, and fetch the
//! authoritative state of a session. Everything else about the provider's
//! object model stays behind this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use poster_core::cart::METADATA_KEY;
use serde::{Deserialize, Serialize};

use crate::checkout::LineItem;
use crate::error::{PaymentError, Result};

/// Event type that triggers fulfillment
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Request for a hosted checkout session
#[derive(Clone, Debug)]
pub struct SessionRequest {
    /// Validated cart contents
    pub line_items: Vec<LineItem>,

    /// Redirect after payment; may contain `{CHECKOUT_SESSION_ID}`
    pub success_url: String,

    /// Redirect when the buyer backs out
    pub cancel_url: String,
}

/// A freshly created hosted session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreatedSession {
    /// Provider session id
    pub id: String,

    /// URL to redirect the buyer to
    pub url: String,
}

/// Payment status of a checkout session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Unpaid => "unpaid",
            Self::NoPaymentRequired => "no_payment_required",
        }
    }
}

/// One purchased line, as reported by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedItem {
    /// Product display name
    pub name: String,

    /// Units bought
    pub quantity: u64,

    /// Line total in minor units
    pub amount_total: i64,

    /// Raw `cartItemId` metadata, unvalidated
    pub cart_item_id: Option<String>,
}

/// Authoritative state of a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub payment_status: PaymentStatus,

    /// Session lifecycle status (`open`, `complete`, `expired`)
    pub status: Option<String>,

    /// Buyer email, from customer details or the prefilled address
    pub customer_email: Option<String>,

    /// Total in minor units
    pub amount_total: Option<i64>,

    /// Lower-case ISO currency code
    pub currency: Option<String>,

    /// Purchased items; empty unless line items were expanded
    pub items: Vec<PurchasedItem>,
}

impl SessionSnapshot {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    /// Build a snapshot from a checkout session in Stripe's JSON shape,
    /// with `line_items.data.price.product` optionally expanded.
    pub fn from_stripe_json(value: serde_json::Value) -> Result<Self> {
        let wire: WireSession = serde_json::from_value(value)
            .map_err(|e| PaymentError::Stripe(format!("unexpected session shape: {e}")))?;

        let payment_status = match wire.payment_status.as_deref() {
            Some("paid") => PaymentStatus::Paid,
            Some("no_payment_required") => PaymentStatus::NoPaymentRequired,
            _ => PaymentStatus::Unpaid,
        };

        let customer_email = wire
            .customer_details
            .and_then(|d| d.email)
            .or(wire.customer_email)
            .filter(|e| !e.trim().is_empty());

        let items = wire
            .line_items
            .map(|list| list.data.into_iter().map(WireLineItem::into_item).collect())
            .unwrap_or_default();

        Ok(Self {
            id: wire.id,
            payment_status,
            status: wire.status,
            customer_email,
            amount_total: wire.amount_total,
            currency: wire.currency.map(|c| c.to_lowercase()),
            items,
        })
    }
}

/// An authenticated webhook delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEvent {
    /// Provider event id, unique per event (stable across redeliveries)
    pub id: String,

    /// Provider event type, e.g. `checkout.session.completed`
    pub event_type: String,

    /// Id of the checkout session the event is about, if any
    pub session_id: Option<String>,
}

impl ProviderEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }

    /// Parse a Stripe event envelope
    pub fn from_stripe_json(payload: &str) -> Result<Self> {
        let wire: WireEvent = serde_json::from_str(payload)
            .map_err(|e| PaymentError::WebhookParse(e.to_string()))?;

        let session_id = wire
            .data
            .and_then(|d| d.object)
            .filter(|o| o.object.as_deref() == Some("checkout.session"))
            .and_then(|o| o.id);

        Ok(Self {
            id: wire.id,
            event_type: wire.event_type,
            session_id,
        })
    }
}

/// Payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provider name (for logging)
    fn name(&self) -> &str;

    /// Create a hosted checkout session
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession>;

    /// Authenticate a raw webhook body against its signature header
    fn verify_event(&self, payload: &str, signature: &str) -> Result<ProviderEvent>;

    /// Fetch a session; `with_items` expands purchased items and product metadata
    async fn retrieve_session(&self, session_id: &str, with_items: bool)
    -> Result<SessionSnapshot>;
}

// ============================================================================
// Stripe wire shapes (only the fields we read)
// ============================================================================

#[derive(Deserialize)]
struct WireEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: Option<WireEventData>,
}

#[derive(Deserialize)]
struct WireEventData {
    object: Option<WireEventObject>,
}

#[derive(Deserialize)]
struct WireEventObject {
    id: Option<String>,
    object: Option<String>,
}

#[derive(Deserialize)]
struct WireSession {
    id: String,
    payment_status: Option<String>,
    status: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<WireCustomerDetails>,
    amount_total: Option<i64>,
    currency: Option<String>,
    line_items: Option<WireList>,
}

#[derive(Deserialize)]
struct WireCustomerDetails {
    email: Option<String>,
}

#[derive(Deserialize)]
struct WireList {
    #[serde(default)]
    data: Vec<WireLineItem>,
}

#[derive(Deserialize)]
struct WireLineItem {
    description: Option<String>,
    quantity: Option<u64>,
    amount_total: Option<i64>,
    price: Option<WirePrice>,
}

#[derive(Deserialize)]
struct WirePrice {
    /// Product id, or the product object when expanded
    product: Option<serde_json::Value>,
    metadata: Option<HashMap<String, String>>,
}

impl WireLineItem {
    fn into_item(self) -> PurchasedItem {
        let product = self.price.as_ref().and_then(|p| p.product.as_ref());

        let product_name = product
            .and_then(|p| p.get("name"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        let cart_item_id = product
            .and_then(|p| p.get("metadata"))
            .and_then(|m| m.get(METADATA_KEY))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                self.price
                    .as_ref()
                    .and_then(|p| p.metadata.as_ref())
                    .and_then(|m| m.get(METADATA_KEY).cloned())
            });

        PurchasedItem {
            name: product_name
                .or(self.description)
                .unwrap_or_else(|| "Poster".to_string()),
            quantity: self.quantity.unwrap_or(1),
            amount_total: self.amount_total.unwrap_or(0),
            cart_item_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_from_expanded_session() {
        let session = json!({
            "id": "cs_test_a1",
            "object": "checkout.session",
            "payment_status": "paid",
            "status": "complete",
            "customer_email": null,
            "customer_details": { "email": "buyer@example.com", "name": "Ada" },
            "amount_total": 5980,
            "currency": "eur",
            "line_items": {
                "object": "list",
                "data": [
                    {
                        "id": "li_1",
                        "description": "Poster A3",
                        "quantity": 2,
                        "amount_total": 5980,
                        "price": {
                            "id": "price_1",
                            "metadata": {},
                            "product": {
                                "id": "prod_1",
                                "name": "Poster A3",
                                "metadata": { "cartItemId": "cart-1700000000000-abc123" }
                            }
                        }
                    }
                ]
            }
        });

        let snapshot = SessionSnapshot::from_stripe_json(session).unwrap();
        assert!(snapshot.is_paid());
        assert_eq!(snapshot.customer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(snapshot.currency.as_deref(), Some("eur"));
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(
            snapshot.items[0],
            PurchasedItem {
                name: "Poster A3".into(),
                quantity: 2,
                amount_total: 5980,
                cart_item_id: Some("cart-1700000000000-abc123".into()),
            }
        );
    }

    #[test]
    fn test_snapshot_unexpanded_product() {
        let session = json!({
            "id": "cs_test_a2",
            "payment_status": "unpaid",
            "customer_email": "prefill@example.com",
            "line_items": { "data": [ {
                "description": "Poster",
                "quantity": 1,
                "amount_total": 100,
                "price": { "product": "prod_1" }
            } ] }
        });

        let snapshot = SessionSnapshot::from_stripe_json(session).unwrap();
        assert_eq!(snapshot.payment_status, PaymentStatus::Unpaid);
        assert_eq!(snapshot.customer_email.as_deref(), Some("prefill@example.com"));
        assert_eq!(snapshot.items[0].cart_item_id, None);
        assert_eq!(snapshot.items[0].name, "Poster");
    }

    #[test]
    fn test_snapshot_blank_email_is_none() {
        let session = json!({
            "id": "cs_test_a3",
            "payment_status": "paid",
            "customer_details": { "email": "  " }
        });
        let snapshot = SessionSnapshot::from_stripe_json(session).unwrap();
        assert_eq!(snapshot.customer_email, None);
        assert!(snapshot.items.is_empty());
    }

    #[test]
    fn test_event_envelope() {
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_a1", "object": "checkout.session" } }
        })
        .to_string();

        let event = ProviderEvent::from_stripe_json(&payload).unwrap();
        assert!(event.is_checkout_completed());
        assert_eq!(event.session_id.as_deref(), Some("cs_test_a1"));
    }

    #[test]
    fn test_event_other_object() {
        let payload = json!({
            "id": "evt_2",
            "type": "invoice.paid",
            "data": { "object": { "id": "in_1", "object": "invoice" } }
        })
        .to_string();

        let event = ProviderEvent::from_stripe_json(&payload).unwrap();
        assert!(!event.is_checkout_completed());
        assert_eq!(event.session_id, None);
    }

    #[test]
    fn test_event_malformed() {
        assert!(matches!(
            ProviderEvent::from_stripe_json("not json"),
            Err(PaymentError::WebhookParse(_))
        ));
    }
}
