//! Stripe Webhook Handling
//!
//! Turns an authenticated `checkout.session.completed` delivery into an order
//! confirmation email.
//!
//! ```text
//! verify ──▶ filter type ──▶ dedupe ──▶ re-fetch session ──▶ preconditions ──▶ notify
//! ```
//!
//! Only signature verification can fail the HTTP request. Everything after it
//! produces a [`WebhookOutcome`] that the caller logs; the provider gets a 200
//! so it does not keep redelivering an event we already accepted. The one
//! exception is [`WebhookOutcome::InProgress`]: the same event is still being
//! fulfilled by an earlier delivery, and the caller answers with a non-2xx so
//! the provider tries again once that delivery has completed or released it.

use std::sync::Arc;

use poster_core::{ArtifactCatalog, CartItemId};

use crate::error::Result;
use crate::ledger::{Claim, EventLedger};
use crate::notify::{FulfillmentNotifier, OrderItem, OrderSummary, order_reference};
use crate::provider::{PaymentProvider, ProviderEvent};

/// Why a completed checkout was not fulfilled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Event payload did not name a checkout session
    MissingSession,
    /// Session has no buyer email
    NoCustomerEmail,
    /// No purchased line carried a valid cart item id
    NoValidItems,
    /// No email provider configured
    EmailNotConfigured,
}

/// Result of processing a verified event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Confirmation email was sent
    Fulfilled {
        session_id: String,
        items: usize,
        message_id: String,
    },

    /// Event id was already processed
    Duplicate { event_id: String },

    /// Event id is being processed by a concurrent delivery
    InProgress { event_id: String },

    /// Event type we do not act on
    Ignored { event_type: String },

    /// A precondition failed; nothing was sent
    Skipped {
        session_id: String,
        reason: SkipReason,
    },

    /// Re-fetch or dispatch failed; the event id is released for replay
    Failed { session_id: String, error: String },
}

/// Webhook handler
pub struct WebhookHandler {
    payments: Arc<dyn PaymentProvider>,
    catalog: Arc<dyn ArtifactCatalog>,
    ledger: Arc<dyn EventLedger>,
    notifier: Option<FulfillmentNotifier>,
}

impl WebhookHandler {
    pub fn new(
        payments: Arc<dyn PaymentProvider>,
        catalog: Arc<dyn ArtifactCatalog>,
        ledger: Arc<dyn EventLedger>,
        notifier: Option<FulfillmentNotifier>,
    ) -> Self {
        Self {
            payments,
            catalog,
            ledger,
            notifier,
        }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str) -> Result<ProviderEvent> {
        self.payments.verify_event(payload, signature)
    }

    /// Process a verified webhook event
    pub async fn handle(&self, event: ProviderEvent) -> WebhookOutcome {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            provider = self.payments.name(),
            "Processing payment webhook"
        );

        if !event.is_checkout_completed() {
            tracing::debug!(event_type = %event.event_type, "Unhandled webhook event");
            return WebhookOutcome::Ignored {
                event_type: event.event_type,
            };
        }

        let Some(session_id) = event.session_id.clone() else {
            tracing::warn!(event_id = %event.id, "Completed checkout event without session id");
            return WebhookOutcome::Skipped {
                session_id: String::new(),
                reason: SkipReason::MissingSession,
            };
        };

        let claimed = match self.ledger.claim(&event.id).await {
            Ok(Claim::New) => true,
            Ok(Claim::Done) => {
                tracing::info!(event_id = %event.id, "Duplicate webhook event, skipping");
                return WebhookOutcome::Duplicate { event_id: event.id };
            }
            Ok(Claim::InFlight) => {
                tracing::info!(event_id = %event.id, "Webhook event already in progress");
                return WebhookOutcome::InProgress { event_id: event.id };
            }
            Err(e) => {
                tracing::warn!(event_id = %event.id, error = %e, "Event ledger unavailable, processing anyway");
                false
            }
        };

        let outcome = self.fulfill(&session_id).await;

        if let WebhookOutcome::Failed { error, .. } = &outcome {
            tracing::error!(session_id = %session_id, error = %error, "Fulfillment failed");
        }

        if claimed {
            let settled = if matches!(outcome, WebhookOutcome::Failed { .. }) {
                self.ledger.release(&event.id).await
            } else {
                self.ledger.complete(&event.id).await
            };
            if let Err(e) = settled {
                tracing::warn!(event_id = %event.id, error = %e, "Could not update event ledger");
            }
        }

        outcome
    }

    async fn fulfill(&self, session_id: &str) -> WebhookOutcome {
        let skipped = |reason: SkipReason| {
            tracing::warn!(session_id = %session_id, reason = ?reason, "Fulfillment skipped");
            WebhookOutcome::Skipped {
                session_id: session_id.to_string(),
                reason,
            }
        };

        // Re-fetch: the webhook body is not trusted for line items
        let session = match self.payments.retrieve_session(session_id, true).await {
            Ok(session) => session,
            Err(e) => {
                return WebhookOutcome::Failed {
                    session_id: session_id.to_string(),
                    error: e.to_string(),
                };
            }
        };

        let Some(email) = session.customer_email.clone() else {
            return skipped(SkipReason::NoCustomerEmail);
        };

        let purchased: Vec<(CartItemId, String, u64)> = session
            .items
            .iter()
            .filter_map(|item| {
                let raw = item.cart_item_id.as_deref()?;
                match CartItemId::parse(raw) {
                    Ok(id) => Some((id, item.name.clone(), item.quantity)),
                    Err(_) => {
                        tracing::warn!(session_id = %session_id, cart_item_id = %raw, "Skipping line with malformed cart item id");
                        None
                    }
                }
            })
            .collect();

        if purchased.is_empty() {
            return skipped(SkipReason::NoValidItems);
        }

        let Some(notifier) = &self.notifier else {
            return skipped(SkipReason::EmailNotConfigured);
        };

        let items: Vec<OrderItem> = purchased
            .into_iter()
            .map(|(cart_item_id, name, quantity)| OrderItem {
                has_preview: self.catalog.has_preview(&cart_item_id),
                cart_item_id,
                name,
                quantity,
            })
            .collect();

        let order = OrderSummary {
            email,
            amount_total: session
                .amount_total
                .unwrap_or_else(|| session.items.iter().map(|i| i.amount_total).sum()),
            currency: session.currency.clone().unwrap_or_else(|| "eur".into()),
            reference: order_reference(&session.id),
            items,
        };

        match notifier.notify(&order).await {
            Some(message_id) => WebhookOutcome::Fulfilled {
                session_id: session_id.to_string(),
                items: order.items.len(),
                message_id,
            },
            None => WebhookOutcome::Failed {
                session_id: session_id.to_string(),
                error: "email dispatch failed".into(),
            },
        }
    }
}
