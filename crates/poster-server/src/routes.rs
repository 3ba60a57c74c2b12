//! Router

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::{
    create_checkout_session, download_pdf, health_check, root, stripe_webhook, verify_payment,
};
use crate::state::AppState;
use crate::upload::{upload_pdf, upload_pdf_with_preview, upload_poster_pdf};

/// Upper bound on any request body
pub const MAX_UPLOAD_BYTES: usize = 500 * 1024 * 1024;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let origin = match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            tracing::warn!(url = %state.config.frontend_url, error = %e, "FRONTEND_URL is not a valid origin; CORS disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let previews = ServeDir::new(state.store.preview_dir());
    let pdfs = ServeDir::new(state.store.pdf_dir());

    Router::new()
        // Health & info
        .route("/", get(root))
        .route("/health", get(health_check))
        // Uploads
        .route("/api/upload-poster-pdf", post(upload_poster_pdf))
        .route("/api/upload-pdf-with-preview", post(upload_pdf_with_preview))
        .route("/api/upload-pdf", post(upload_pdf))
        // Payments
        .route("/api/create-checkout-session", post(create_checkout_session))
        .route("/api/stripe-webhook", post(stripe_webhook))
        .route("/api/verify-payment/{session_id}", get(verify_payment))
        // Downloads
        .route("/api/download-pdf/{cart_item_id}", get(download_pdf))
        .nest_service("/previews", previews)
        .nest_service("/pdfs", pdfs)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
