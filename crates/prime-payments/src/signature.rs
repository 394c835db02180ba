//! Webhook Signature Verification
//!
//! Provider scheme: the `stripe-signature` header carries `t=<unix>` and one
//! or more `v1=<hex>` entries, each an HMAC-SHA256 of `"{t}.{body}"` keyed
//! with the endpoint secret.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::event::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

/// Header the provider puts the signature in
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed payload, in seconds
pub const DEFAULT_TOLERANCE: i64 = 300;

/// Verifies webhook payloads against the endpoint secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    #[must_use]
    pub const fn with_tolerance(mut self, seconds: i64) -> Self {
        self.tolerance = seconds;
        self
    }

    /// Verify the signature and decode the event
    pub fn construct_event(&self, payload: &str, signature: &str) -> Result<WebhookEvent> {
        self.verify(payload, signature, Utc::now().timestamp())?;
        WebhookEvent::decode(payload)
    }

    /// Check `signature` for `payload` as of `now` (epoch seconds)
    pub fn verify(&self, payload: &str, signature: &str, now: i64) -> Result<()> {
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for part in signature.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| PaymentError::WebhookSignature("Missing timestamp".into()))?;
        if candidates.is_empty() {
            return Err(PaymentError::WebhookSignature("No v1 signature".into()));
        }
        if now - timestamp > self.tolerance {
            return Err(PaymentError::WebhookSignature(
                "Timestamp outside the tolerance zone".into(),
            ));
        }

        for candidate in candidates {
            let Ok(expected) = hex::decode(candidate) else {
                continue;
            };
            let mac = self.mac(timestamp, payload)?;
            if mac.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }

        Err(PaymentError::WebhookSignature(
            "No signatures found matching the expected signature for payload".into(),
        ))
    }

    /// Produce a header value the way the provider does (for tests and local tooling)
    pub fn sign(&self, payload: &str, timestamp: i64) -> Result<String> {
        let digest = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: i64, payload: &str) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| PaymentError::Config(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}
