//! HTTP Handlers

use axum::{
    Json,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use poster_core::CartItemId;
use poster_payments::{SessionRequest, SessionSnapshot, WebhookOutcome, validate_line_items};
use serde::Serialize;
use serde_json::Value;
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub email_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaidResponse {
    is_paid: bool,
    session: SessionSnapshot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnpaidResponse {
    is_paid: bool,
    status: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// Liveness probe
pub async fn root() -> &'static str {
    "Poster fulfillment backend is running"
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.payments.is_some(),
        email_configured: state.email.is_some(),
    })
}

/// Create a hosted checkout session for the posted cart
pub async fn create_checkout_session(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let payments = state.payments()?;
    let Json(body) = payload?;

    let raw = body.get("line_items").and_then(Value::as_array);
    let line_items = validate_line_items(raw.map(Vec::as_slice))?;

    let request = SessionRequest {
        line_items,
        success_url: state.config.success_url(),
        cancel_url: state.config.cancel_url(),
    };

    let session = payments.create_session(&request).await?;
    tracing::info!(
        session_id = %session.id,
        items = request.line_items.len(),
        "Created checkout session"
    );

    Ok(Json(CheckoutResponse { url: session.url }))
}

/// Payment provider webhook
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, ApiError> {
    let payments = state.payments()?.clone();

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidSignature("Missing Stripe signature".into()))?;

    let handler = state.webhook_handler(payments);

    let event = handler.parse_event(&body, signature).map_err(|e| {
        tracing::warn!("Webhook signature failed: {}", e);
        ApiError::InvalidSignature("Invalid signature".into())
    })?;

    match handler.handle(event).await {
        WebhookOutcome::Fulfilled {
            session_id,
            items,
            message_id,
        } => tracing::info!(%session_id, items, %message_id, "Order fulfilled"),
        WebhookOutcome::Failed { session_id, error } => {
            tracing::error!(%session_id, %error, "Webhook processing error");
        }
        WebhookOutcome::InProgress { event_id } => {
            return Err(ApiError::Conflict(format!(
                "Event {event_id} is already being processed"
            )));
        }
        outcome => tracing::debug!(?outcome, "Webhook acknowledged"),
    }

    Ok(Json(WebhookAck { received: true }))
}

/// Report whether a checkout session has been paid
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let payments = state.payments()?;
    let session = payments.retrieve_session(&session_id, false).await?;

    if session.is_paid() {
        Ok(Json(PaidResponse {
            is_paid: true,
            session,
        })
        .into_response())
    } else {
        Ok((
            StatusCode::PAYMENT_REQUIRED,
            Json(UnpaidResponse {
                is_paid: false,
                status: session.payment_status.as_str(),
            }),
        )
            .into_response())
    }
}

/// Stream a stored PDF artifact as an attachment
pub async fn download_pdf(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = CartItemId::parse(&raw_id)?;

    let Some((file, len)) = state.store.open_pdf(&id).await? else {
        return Err(ApiError::NotFound(format!("No PDF found for {id}")));
    };

    tracing::info!(cart_item_id = %id, size = len, "Serving PDF download");

    let log_id = id.clone();
    let stream = ReaderStream::new(file).inspect_err(move |e| {
        tracing::error!(cart_item_id = %log_id, error = %e, "PDF stream failed mid-transfer");
    });

    let disposition = format!("attachment; filename=\"poster-{}.pdf\"", id.short_label());
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::Internal(format!("invalid header: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
