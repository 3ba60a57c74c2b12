//! Stripe Checkout Integration
//!
//! Implements the "Stripe Checkout (Hosted)" approach: the storefront posts
//! its cart, we validate it and hand back the URL of Stripe's hosted payment
//! page. Each line item carries its cart item id as product metadata so the
//! webhook can map purchased lines back to stored artifacts.

use std::collections::HashMap;

use async_trait::async_trait;
use poster_core::CartItemId;
use poster_core::cart::METADATA_KEY;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};

use crate::error::{PaymentError, Result};
use crate::provider::{
    CreatedSession, PaymentProvider, ProviderEvent, SessionRequest, SessionSnapshot,
};
use crate::signature;

/// Expansion that brings product metadata into a retrieved session
const EXPAND_PRODUCTS: &[&str] = &["line_items.data.price.product"];

/// Placeholder Stripe substitutes with the session id on redirect
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// A validated cart line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Lower-case ISO 4217 code
    pub currency: String,

    /// Unit price in minor units
    pub unit_amount: i64,

    /// Product display name
    pub name: String,

    /// Optional product description
    pub description: Option<String>,

    /// Product image URLs shown on the hosted page
    pub images: Vec<String>,

    /// Units
    pub quantity: u64,

    /// Artifact this line pays for
    pub cart_item_id: CartItemId,
}

/// Validate a storefront cart payload.
///
/// Each entry must look like a hosted-checkout line item:
///
/// ```json
/// { "price_data": { "currency": "eur", "unit_amount": 2990,
///                   "product_data": { "name": "Poster A3",
///                                     "metadata": { "cartItemId": "cart-1-ab" } } },
///   "quantity": 1 }
/// ```
///
/// Every violation is reported, prefixed with the item's position.
pub fn validate_line_items(raw: Option<&[Value]>) -> Result<Vec<LineItem>> {
    let Some(raw) = raw else {
        return Err(PaymentError::InvalidLineItems(vec![
            "line_items: required".into(),
        ]));
    };
    if raw.is_empty() {
        return Err(PaymentError::InvalidLineItems(vec![
            "line_items: must contain at least one item".into(),
        ]));
    }

    let mut items = Vec::with_capacity(raw.len());
    let mut violations = Vec::new();
    for (index, value) in raw.iter().enumerate() {
        match validate_line_item(value) {
            Ok(item) => items.push(item),
            Err(reasons) => violations.extend(
                reasons
                    .into_iter()
                    .map(|reason| format!("line_items[{index}]: {reason}")),
            ),
        }
    }

    if violations.is_empty() {
        Ok(items)
    } else {
        Err(PaymentError::InvalidLineItems(violations))
    }
}

fn validate_line_item(value: &Value) -> std::result::Result<LineItem, Vec<String>> {
    let mut reasons = Vec::new();
    let price = value.get("price_data");
    let product = price.and_then(|p| p.get("product_data"));

    if price.is_none() {
        reasons.push("price_data: required".to_string());
    }

    let currency = price
        .and_then(|p| p.get("currency"))
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .filter(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_lowercase()));
    if price.is_some() && currency.is_none() {
        reasons.push("price_data.currency: must be a three-letter currency code".into());
    }

    let unit_amount = price
        .and_then(|p| p.get("unit_amount"))
        .and_then(Value::as_i64)
        .filter(|a| *a > 0);
    if price.is_some() && unit_amount.is_none() {
        reasons.push("price_data.unit_amount: must be a positive integer".into());
    }

    let name = product
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    if price.is_some() && name.is_none() {
        reasons.push("price_data.product_data.name: required".into());
    }

    let description = product
        .and_then(|p| p.get("description"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let images = product
        .and_then(|p| p.get("images"))
        .and_then(Value::as_array)
        .map(|urls| {
            urls.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let quantity = value
        .get("quantity")
        .and_then(Value::as_u64)
        .filter(|q| *q > 0);
    if quantity.is_none() {
        reasons.push("quantity: must be a positive integer".into());
    }

    let raw_id = product
        .and_then(|p| p.get("metadata"))
        .and_then(|m| m.get(METADATA_KEY))
        .and_then(Value::as_str);
    let cart_item_id = match raw_id {
        Some(raw) => match CartItemId::parse(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                reasons.push(format!(
                    "price_data.product_data.metadata.{METADATA_KEY}: invalid format"
                ));
                None
            }
        },
        None => {
            reasons.push(format!(
                "price_data.product_data.metadata.{METADATA_KEY}: required"
            ));
            None
        }
    };

    match (currency, unit_amount, name, quantity, cart_item_id) {
        (Some(currency), Some(unit_amount), Some(name), Some(quantity), Some(cart_item_id))
            if reasons.is_empty() =>
        {
            Ok(LineItem {
                currency,
                unit_amount,
                name,
                description,
                images,
                quantity,
                cart_item_id,
            })
        }
        _ => Err(reasons),
    }
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
    tolerance_secs: i64,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
            tolerance_secs: signature::DEFAULT_TOLERANCE_SECS,
        }
    }

    fn stripe_line_item(item: &LineItem) -> Result<CreateCheckoutSessionLineItems> {
        let currency: Currency = serde_json::from_value(Value::String(item.currency.clone()))
            .map_err(|_| {
                PaymentError::InvalidLineItems(vec![format!(
                    "price_data.currency: unsupported currency '{}'",
                    item.currency
                )])
            })?;

        let mut metadata = HashMap::new();
        metadata.insert(METADATA_KEY.to_string(), item.cart_item_id.to_string());

        Ok(CreateCheckoutSessionLineItems {
            quantity: Some(item.quantity),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(item.unit_amount),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: item.name.clone(),
                    description: item.description.clone(),
                    images: (!item.images.is_empty()).then(|| item.images.clone()),
                    metadata: Some(metadata),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    fn name(&self) -> &str {
        "stripe"
    }

    /// Create a Stripe Checkout session (Hosted approach)
    ///
    /// Returns a URL to redirect the buyer to Stripe's hosted checkout page.
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession> {
        let line_items = request
            .line_items
            .iter()
            .map(Self::stripe_line_item)
            .collect::<Result<Vec<_>>>()?;

        let cart_item_ids = request
            .line_items
            .iter()
            .map(|item| item.cart_item_id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.line_items = Some(line_items);

        // Stripe caps metadata values at 500 characters
        if cart_item_ids.len() <= 500 {
            let mut metadata = HashMap::new();
            metadata.insert("cartItemIds".to_string(), cart_item_ids);
            params.metadata = Some(metadata);
        }

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(CreatedSession {
            id: session.id.to_string(),
            url,
        })
    }

    fn verify_event(&self, payload: &str, signature_header: &str) -> Result<ProviderEvent> {
        signature::verify(
            payload.as_bytes(),
            signature_header,
            &self.webhook_secret,
            chrono::Utc::now().timestamp(),
            self.tolerance_secs,
        )?;
        ProviderEvent::from_stripe_json(payload)
    }

    async fn retrieve_session(
        &self,
        session_id: &str,
        with_items: bool,
    ) -> Result<SessionSnapshot> {
        let id = session_id
            .parse::<CheckoutSessionId>()
            .map_err(|e| PaymentError::InvalidSessionId(format!("{session_id}: {e}")))?;

        let expand = if with_items { EXPAND_PRODUCTS } else { &[] };
        let session = StripeCheckoutSession::retrieve(&self.client, &id, expand)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let value = serde_json::to_value(&session)
            .map_err(|e| PaymentError::Stripe(format!("could not read session: {e}")))?;
        SessionSnapshot::from_stripe_json(value)
    }
}
