//! Webhook Signature Verification
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"<timestamp>.<body>"`
//! and sends the result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869...,v1=...
//! ```
//!
//! A delivery is authentic when any `v1` entry matches and the timestamp is
//! within tolerance of the local clock. This is the only authenticity check
//! in front of fulfillment.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum clock distance between signing and verification
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify a signature header against the raw request body
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("no v1 signature".into()));
    }

    let mac = signed_mac(payload, secret, timestamp)?;
    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(PaymentError::WebhookSignature(
            "no signature matches the payload".into(),
        ));
    }

    if (now - timestamp).abs() > tolerance_secs {
        return Err(PaymentError::WebhookSignature(format!(
            "timestamp {timestamp} outside tolerance"
        )));
    }

    Ok(())
}

/// Produce a `Stripe-Signature` header value for a payload
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mac = signed_mac(payload, secret, timestamp)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_mac(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_round_trip() {
        let header = sign(BODY, SECRET, NOW).unwrap();
        assert!(verify(BODY, &header, SECRET, NOW + 10, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256(secret, "<t>.<body>")
        let header = sign(BODY, SECRET, NOW).unwrap();
        let expected = {
            let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
            mac.update(format!("{NOW}.").as_bytes());
            mac.update(BODY);
            hex::encode(mac.finalize().into_bytes())
        };
        assert_eq!(header, format!("t={NOW},v1={expected}"));
    }

    #[test]
    fn test_tampered_body() {
        let header = sign(BODY, SECRET, NOW).unwrap();
        let tampered = br#"{"id":"evt_1","type":"checkout.session.completed "}"#;
        assert!(verify(tampered, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign(BODY, "whsec_other", NOW).unwrap();
        assert!(verify(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_err());
    }

    #[test]
    fn test_stale_timestamp() {
        let header = sign(BODY, SECRET, NOW).unwrap();
        let err = verify(BODY, &header, SECRET, NOW + 301, DEFAULT_TOLERANCE_SECS).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign(BODY, SECRET, NOW).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={good_sig}");
        assert!(verify(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "t=abc,v1=00", "v1=00", format!("t={NOW}").as_str()] {
            assert!(
                verify(BODY, header, SECRET, NOW, DEFAULT_TOLERANCE_SECS).is_err(),
                "accepted {header:?}"
            );
        }
    }
}
