//! Fulfillment Notifier
//!
//! Renders the order confirmation email and hands it to the email provider.
//! Send failures are logged and reported to the caller as `None`; they are
//! never retried here.

use std::fmt::Write as _;
use std::sync::Arc;

use poster_core::{CartItemId, EmailMessage, EmailSender};

/// Currencies Stripe amounts carry without minor units
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

const SUBJECT: &str = "Your poster order is ready to download";

/// Builds the public URLs placed in emails
#[derive(Clone, Debug)]
pub struct LinkBuilder {
    frontend_url: String,
    backend_url: String,
}

impl LinkBuilder {
    pub fn new(frontend_url: impl Into<String>, backend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Storefront page that fetches the artifact for the buyer
    pub fn download_url(&self, id: &CartItemId) -> String {
        format!("{}/download/{id}", self.frontend_url)
    }

    /// Publicly served preview thumbnail
    pub fn preview_url(&self, id: &CartItemId) -> String {
        format!("{}/previews/{}", self.backend_url, id.preview_file_name())
    }
}

/// One line of a confirmed order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderItem {
    pub cart_item_id: CartItemId,
    pub name: String,
    pub quantity: u64,
    pub has_preview: bool,
}

/// Everything the confirmation email shows
#[derive(Clone, Debug)]
pub struct OrderSummary {
    pub email: String,
    pub items: Vec<OrderItem>,

    /// Total in minor units
    pub amount_total: i64,

    /// Lower-case ISO currency code
    pub currency: String,

    /// Short order reference shown to the buyer
    pub reference: String,
}

/// Composes and dispatches order confirmations
#[derive(Clone)]
pub struct FulfillmentNotifier {
    sender: Arc<dyn EmailSender>,
    links: LinkBuilder,
}

impl FulfillmentNotifier {
    pub fn new(sender: Arc<dyn EmailSender>, links: LinkBuilder) -> Self {
        Self { sender, links }
    }

    /// Render the confirmation email for an order
    pub fn compose(&self, order: &OrderSummary) -> EmailMessage {
        let mut rows = String::new();
        for item in &order.items {
            let thumbnail = if item.has_preview {
                format!(
                    r#"<img src="{}" alt="{}" width="120" style="display:block;border:1px solid #ddd;border-radius:4px">"#,
                    escape_html(&self.links.preview_url(&item.cart_item_id)),
                    escape_html(&item.name),
                )
            } else {
                String::new()
            };

            let _ = write!(
                rows,
                r#"<tr>
  <td style="padding:12px 8px;vertical-align:top">{thumbnail}</td>
  <td style="padding:12px 8px;vertical-align:top">
    <strong>{name}</strong><br>
    Quantity: {quantity}<br>
    <a href="{link}" style="color:#1a73e8">Download your poster (PDF)</a>
  </td>
</tr>
"#,
                name = escape_html(&item.name),
                quantity = item.quantity,
                link = escape_html(&self.links.download_url(&item.cart_item_id)),
            );
        }

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family:Helvetica,Arial,sans-serif;color:#222;max-width:600px;margin:0 auto">
<h1 style="font-size:22px">Thank you for your order!</h1>
<p>Your payment was received. Your personalized posters are ready to download.</p>
<p>Order reference: <strong>{reference}</strong></p>
<table style="width:100%;border-collapse:collapse">
{rows}</table>
<p style="margin-top:24px">Total paid: <strong>{total}</strong></p>
<p style="color:#777;font-size:12px">Keep this email: the links above are how you download your files.</p>
</body>
</html>
"#,
            reference = escape_html(&order.reference),
            total = format_amount(order.amount_total, &order.currency),
        );

        EmailMessage {
            to: order.email.clone(),
            subject: format!("{SUBJECT} ({})", order.reference),
            html,
        }
    }

    /// Compose and send; returns the provider message id on success.
    ///
    /// Failures are logged and swallowed.
    pub async fn notify(&self, order: &OrderSummary) -> Option<String> {
        let message = self.compose(order);
        match self.sender.send(&message).await {
            Ok(message_id) => {
                tracing::info!(
                    provider = self.sender.name(),
                    message_id = %message_id,
                    email = %order.email,
                    reference = %order.reference,
                    items = order.items.len(),
                    "Sent order confirmation"
                );
                Some(message_id)
            }
            Err(e) => {
                tracing::error!(
                    provider = self.sender.name(),
                    error = %e,
                    retryable = e.is_retryable(),
                    email = %order.email,
                    reference = %order.reference,
                    "Failed to send order confirmation"
                );
                None
            }
        }
    }
}

/// Short, buyer-facing reference for a session id
pub fn order_reference(session_id: &str) -> String {
    let chars: Vec<char> = session_id.chars().collect();
    let start = chars.len().saturating_sub(8);
    chars[start..].iter().collect::<String>().to_uppercase()
}

/// Format a minor-unit amount, e.g. `5980, "eur"` → `59.80 EUR`
pub fn format_amount(minor: i64, currency: &str) -> String {
    let code = currency.to_uppercase();
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.to_lowercase().as_str()) {
        return format!("{minor} {code}");
    }
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02} {code}", abs / 100, abs % 100)
}

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
