//! Application State

use std::sync::Arc;

use poster_core::{ArtifactCatalog, EmailSender};
use poster_media::FileStore;
use poster_payments::{
    EventLedger, FulfillmentNotifier, LinkBuilder, PaymentProvider, WebhookHandler,
};

use crate::config::AppConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Startup configuration
    pub config: Arc<AppConfig>,

    /// Payment provider (optional - None if not configured)
    pub payments: Option<Arc<dyn PaymentProvider>>,

    /// Email provider (optional - None if not configured)
    pub email: Option<Arc<dyn EmailSender>>,

    /// PDF and preview storage
    pub store: Arc<FileStore>,

    /// Artifact lookups used while composing confirmations
    pub catalog: Arc<dyn ArtifactCatalog>,

    /// Processed webhook events
    pub ledger: Arc<dyn EventLedger>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        payments: Option<Arc<dyn PaymentProvider>>,
        email: Option<Arc<dyn EmailSender>>,
        store: Arc<FileStore>,
        ledger: Arc<dyn EventLedger>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            payments,
            email,
            catalog: store.clone(),
            store,
            ledger,
        }
    }

    /// Payment provider, or 503 when unconfigured
    pub fn payments(&self) -> Result<&Arc<dyn PaymentProvider>, crate::error::ApiError> {
        self.payments
            .as_ref()
            .ok_or_else(crate::error::ApiError::payments_disabled)
    }

    pub fn links(&self) -> LinkBuilder {
        LinkBuilder::new(&self.config.frontend_url, &self.config.backend_url)
    }

    /// Webhook pipeline wired to the configured integrations
    pub fn webhook_handler(&self, payments: Arc<dyn PaymentProvider>) -> WebhookHandler {
        let notifier = self
            .email
            .clone()
            .map(|sender| FulfillmentNotifier::new(sender, self.links()));
        WebhookHandler::new(payments, self.catalog.clone(), self.ledger.clone(), notifier)
    }
}
