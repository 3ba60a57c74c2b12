//! Server Configuration
//!
//! Built once at startup from the environment (after `.env` is loaded) and
//! shared read-only through `AppState`.

use std::path::PathBuf;

use poster_runtime::resend::DEFAULT_FROM;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_STORAGE_DIR: &str = "./uploads";
const LEDGER_FILE: &str = "processed-events.log";

/// Stripe credentials; both are required for payments
#[derive(Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
}

/// Transactional email settings
#[derive(Clone)]
pub struct EmailSettings {
    pub api_key: String,
    pub from: String,
}

/// Application configuration
#[derive(Clone)]
pub struct AppConfig {
    /// Listen port on all interfaces
    pub port: u16,

    /// Storefront origin: CORS, checkout redirects, download links
    pub frontend_url: String,

    /// Public base of this service, used for preview thumbnails in email
    pub backend_url: String,

    /// Root holding `pdfs/` and `previews/`
    pub storage_dir: PathBuf,

    /// Processed webhook event ids
    pub event_ledger_path: PathBuf,

    /// `None` disables checkout, webhook and payment verification
    pub stripe: Option<StripeSettings>,

    /// `None` disables confirmation emails
    pub email: Option<EmailSettings>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = var("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let frontend_url =
            trim_url(var("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.into()));
        let backend_url =
            trim_url(var("BACKEND_URL").unwrap_or_else(|| format!("http://localhost:{port}")));

        let storage_dir =
            PathBuf::from(var("STORAGE_DIR").unwrap_or_else(|| DEFAULT_STORAGE_DIR.into()));
        let event_ledger_path = var("EVENT_LEDGER_PATH")
            .map_or_else(|| storage_dir.join(LEDGER_FILE), PathBuf::from);

        let stripe = match (var("STRIPE_SECRET_KEY"), var("STRIPE_WEBHOOK_SECRET")) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeSettings {
                secret_key,
                webhook_secret,
            }),
            _ => None,
        };

        let email = var("RESEND_API_KEY").map(|api_key| EmailSettings {
            api_key,
            from: var("EMAIL_FROM").unwrap_or_else(|| DEFAULT_FROM.into()),
        });

        Self {
            port,
            frontend_url,
            backend_url,
            storage_dir,
            event_ledger_path,
            stripe,
            email,
        }
    }

    /// Where Stripe sends the buyer after paying
    pub fn success_url(&self) -> String {
        format!(
            "{}/success?session_id={}",
            self.frontend_url,
            poster_payments::SESSION_ID_PLACEHOLDER
        )
    }

    /// Where Stripe sends the buyer on cancel
    pub fn cancel_url(&self) -> String {
        format!("{}/cart", self.frontend_url)
    }
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
