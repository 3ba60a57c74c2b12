//! HTTP Error Mapping
//!
//! Every failing handler returns an [`ApiError`], rendered as
//! `{ "error": ..., "code": ... }` with `details` for validation failures.

use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use poster_core::ShopError;
use poster_media::MediaError;
use poster_payments::PaymentError;
use serde::Serialize;

/// Handler error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed client input
    #[error("{0}")]
    BadRequest(String),

    /// Cart payload failed validation
    #[error("Invalid line items")]
    InvalidLineItems(Vec<String>),

    /// Webhook authenticity check failed
    #[error("{0}")]
    InvalidSignature(String),

    #[error("{0}")]
    NotFound(String),

    /// Request raced an earlier one that is still running
    #[error("{0}")]
    Conflict(String),

    /// Optional integration not configured
    #[error("{0}")]
    Unavailable(String),

    /// Payment or email provider failure; message passed through
    #[error("{0}")]
    Upstream(String),

    /// Filesystem or processing failure
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [String]>,
}

impl ApiError {
    pub fn payments_disabled() -> Self {
        Self::Unavailable("Payments not configured".into())
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidLineItems(_) | Self::InvalidSignature(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidLineItems(_) => "INVALID_LINE_ITEMS",
            Self::InvalidSignature(_) => "INVALID_SIGNATURE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Upstream(_) => "PROVIDER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        } else {
            tracing::warn!(code = self.code(), error = %self, "Request rejected");
        }

        let details = match &self {
            Self::InvalidLineItems(details) => Some(details.as_slice()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidLineItems(details) => Self::InvalidLineItems(details),
            PaymentError::InvalidSessionId(_) => Self::BadRequest(err.to_string()),
            PaymentError::WebhookSignature(_) | PaymentError::WebhookParse(_) => {
                Self::InvalidSignature(err.to_string())
            }
            PaymentError::Stripe(message) => Self::Upstream(message),
            PaymentError::Ledger(_) | PaymentError::Config(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ShopError> for ApiError {
    fn from(err: ShopError) -> Self {
        match err {
            ShopError::InvalidCartItemId(_) => Self::BadRequest(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid JSON body: {}", err.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(format!("Failed to read multipart body: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_taxonomy() {
        let cases = [
            (ApiError::BadRequest("x".into()), 400),
            (ApiError::InvalidLineItems(vec![]), 400),
            (ApiError::InvalidSignature("x".into()), 400),
            (ApiError::NotFound("x".into()), 404),
            (ApiError::Conflict("x".into()), 409),
            (ApiError::payments_disabled(), 503),
            (ApiError::Upstream("x".into()), 500),
            (ApiError::Internal("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status().as_u16(), status, "{err:?}");
        }
    }

    #[test]
    fn test_payment_error_mapping() {
        assert!(matches!(
            ApiError::from(PaymentError::InvalidLineItems(vec!["line_items[0]: x".into()])),
            ApiError::InvalidLineItems(d) if d.len() == 1
        ));
        assert!(matches!(
            ApiError::from(PaymentError::WebhookSignature("bad".into())),
            ApiError::InvalidSignature(_)
        ));
        assert!(matches!(
            ApiError::from(PaymentError::Stripe("card declined".into())),
            ApiError::Upstream(m) if m == "card declined"
        ));
    }
}
