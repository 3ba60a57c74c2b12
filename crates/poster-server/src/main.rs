//! Poster Fulfillment HTTP Server
//!
//! Axum-based server for the poster storefront: PDF uploads and previews,
//! hosted checkout, the payment webhook that emails download links, and the
//! download gateway those links point at.

mod config;
mod error;
mod handlers;
mod routes;
mod state;
mod upload;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use poster_core::EmailSender;
use poster_media::FileStore;
use poster_payments::{FileEventLedger, PaymentProvider, StripeClient};
use poster_runtime::{ResendConfig, ResendSender};

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    // Storage
    let store = Arc::new(FileStore::new(&config.storage_dir));
    store.ensure_dirs().await?;
    tracing::info!("✓ Storage at {}", config.storage_dir.display());

    let ledger = Arc::new(FileEventLedger::open(&config.event_ledger_path)?);
    tracing::info!("✓ Event ledger at {}", ledger.path().display());

    // Initialize payments
    let payments: Option<Arc<dyn PaymentProvider>> = match &config.stripe {
        Some(stripe) => {
            tracing::info!("✓ Stripe configured");
            Some(Arc::new(StripeClient::new(
                &stripe.secret_key,
                &stripe.webhook_secret,
            )))
        }
        None => {
            tracing::warn!("⚠ Stripe not configured - payments disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    // Initialize email
    let email: Option<Arc<dyn EmailSender>> = match &config.email {
        Some(settings) => {
            let resend = ResendSender::from_config(ResendConfig {
                api_key: settings.api_key.clone(),
                from: settings.from.clone(),
                ..Default::default()
            });
            match resend {
                Ok(sender) => {
                    tracing::info!("✓ Email configured (from {})", settings.from);
                    Some(Arc::new(sender))
                }
                Err(e) => {
                    tracing::warn!("⚠ Email provider failed to initialize: {}", e);
                    None
                }
            }
        }
        None => {
            tracing::warn!("⚠ Email not configured - order confirmations disabled");
            tracing::warn!("  Set RESEND_API_KEY in .env");
            None
        }
    };

    let port = config.port;
    let frontend_url = config.frontend_url.clone();
    let state = AppState::new(config, payments, email, store, ledger);
    let app = routes::router(state);

    // Start server
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 poster server running on http://{}", addr);
    tracing::info!("   accepting requests from {}", frontend_url);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                          - Health check");
    tracing::info!("  POST /api/upload-poster-pdf           - Upload PDF for a cart item");
    tracing::info!("  POST /api/upload-pdf-with-preview     - Upload PDF with preview image");
    tracing::info!("  POST /api/upload-pdf                  - Upload PDF");
    tracing::info!("  POST /api/create-checkout-session     - Create Stripe checkout");
    tracing::info!("  POST /api/stripe-webhook              - Stripe webhook");
    tracing::info!("  GET  /api/verify-payment/{{session}}    - Payment status");
    tracing::info!("  GET  /api/download-pdf/{{cartItemId}}   - Download purchased PDF");
    tracing::info!("  GET  /previews/*                      - Preview images");
    tracing::info!("  GET  /pdfs/*                          - PDFs uploaded without a cart item");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
