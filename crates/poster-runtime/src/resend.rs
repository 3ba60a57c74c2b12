//! Resend Email Provider
//!
//! Implementation of `EmailSender` for the Resend HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use poster_core::{EmailMessage, EmailSender, Result, ShopError};
use serde::{Deserialize, Serialize};

/// Default sender identity
pub const DEFAULT_FROM: &str = "Posters <orders@example.com>";

/// Resend provider configuration
#[derive(Clone, Debug)]
pub struct ResendConfig {
    /// API key (`re_...`)
    pub api_key: String,

    /// `From` header, e.g. `Shop <orders@shop.com>`
    pub from: String,

    /// API base URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from: DEFAULT_FROM.into(),
            base_url: "https://api.resend.com".into(),
            timeout_secs: 30,
        }
    }
}

/// Resend email provider
pub struct ResendSender {
    client: reqwest::Client,
    config: ResendConfig,
}

impl ResendSender {
    /// Create from configuration
    pub fn from_config(config: ResendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ShopError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/emails", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(&'a self, message: &'a EmailMessage) -> SendRequest<'a> {
        SendRequest {
            from: &self.config.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        }
    }

    /// Map an API response to a message id or a typed failure
    fn parse_response(status: u16, body: &str) -> Result<String> {
        if (200..300).contains(&status) {
            let sent: SendResponse = serde_json::from_str(body)?;
            return Ok(sent.id);
        }

        let detail = serde_json::from_str::<ApiError>(body)
            .map(|e| e.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());
        let message = format!("HTTP {status}: {detail}");

        if status == 429 || status >= 500 {
            Err(ShopError::EmailUnavailable(message))
        } else {
            Err(ShopError::Email(message))
        }
    }
}

#[async_trait]
impl EmailSender for ResendSender {
    fn name(&self) -> &str {
        "Resend"
    }

    async fn send(&self, message: &EmailMessage) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(message))
            .send()
            .await
            .map_err(|e| ShopError::EmailUnavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ShopError::EmailUnavailable(e.to_string()))?;

        tracing::debug!(status, to = %message.to, "Resend responded");
        Self::parse_response(status, &body)
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ResendConfig::default();
        assert_eq!(config.from, DEFAULT_FROM);
        assert_eq!(config.base_url, "https://api.resend.com");
    }

    #[test]
    fn test_request_body() {
        let sender = ResendSender::from_config(ResendConfig {
            api_key: "re_test".into(),
            from: "Shop <orders@shop.test>".into(),
            ..Default::default()
        })
        .unwrap();
        let message = EmailMessage {
            to: "buyer@example.com".into(),
            subject: "Your order".into(),
            html: "<p>hi</p>".into(),
        };

        let body = serde_json::to_value(sender.build_request(&message)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "from": "Shop <orders@shop.test>",
                "to": ["buyer@example.com"],
                "subject": "Your order",
                "html": "<p>hi</p>",
            })
        );
        assert_eq!(sender.endpoint(), "https://api.resend.com/emails");
    }

    #[test]
    fn test_parse_success() {
        let id = ResendSender::parse_response(200, r#"{"id":"4ef9a417-02e9"}"#).unwrap();
        assert_eq!(id, "4ef9a417-02e9");
    }

    #[test]
    fn test_parse_failures() {
        let rejected = ResendSender::parse_response(
            422,
            r#"{"statusCode":422,"name":"validation_error","message":"Invalid `to` field"}"#,
        )
        .unwrap_err();
        assert!(matches!(rejected, ShopError::Email(ref m) if m.contains("Invalid `to` field")));
        assert!(!rejected.is_retryable());

        let limited = ResendSender::parse_response(429, "slow down").unwrap_err();
        assert!(matches!(limited, ShopError::EmailUnavailable(_)));
        assert!(limited.is_retryable());

        assert!(matches!(
            ResendSender::parse_response(503, "").unwrap_err(),
            ShopError::EmailUnavailable(_)
        ));
    }

    #[test]
    fn test_malformed_success_body() {
        assert!(matches!(
            ResendSender::parse_response(200, "<html>"),
            Err(ShopError::Json(_))
        ));
    }
}
