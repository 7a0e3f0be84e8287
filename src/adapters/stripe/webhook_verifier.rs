//! Stripe webhook signature verification.
//!
//! Stripe signs `"{timestamp}.{raw body}"` with HMAC-SHA256 using the
//! endpoint's signing secret and sends the result in the `Stripe-Signature`
//! header. Verification must run on the raw bytes before any JSON parsing.
//!
//! # Security
//!
//! - Constant-time comparison of signatures
//! - Events older than 5 minutes, or more than 60 seconds in the future, are rejected
//! - Optional livemode enforcement

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::ports::{BillingError, WebhookEvent, WebhookEventType};

use super::stripe_types::{SignatureHeader, StripeWebhookEvent};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
pub const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
pub const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Verifies and parses signed webhook deliveries.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    require_livemode: bool,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            require_livemode: false,
        }
    }

    /// Reject test mode events.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    /// Verify the signature against the current clock and parse the event.
    pub fn verify(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, BillingError> {
        self.verify_at(payload, signature, chrono::Utc::now().timestamp())
    }

    /// Same as [`verify`](Self::verify) with an explicit clock.
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<WebhookEvent, BillingError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            BillingError::invalid_webhook(e.to_string())
        })?;

        self.check_signature(payload, &header, now)?;

        let event = self.parse_event(payload)?;
        tracing::debug!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            "Webhook signature verified"
        );
        Ok(event)
    }

    /// Build a valid `Stripe-Signature` header for a payload.
    ///
    /// Used by fakes and tests that need to deliver signed events.
    pub fn signature_header_for(&self, payload: &[u8], timestamp: i64) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(self.compute_signature(payload, timestamp))
        )
    }

    fn compute_signature(&self, payload: &[u8], timestamp: i64) -> Vec<u8> {
        // HMAC accepts keys of any length, so new_from_slice cannot fail here.
        let mut mac = match HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn check_signature(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
        now: i64,
    ) -> Result<(), BillingError> {
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(BillingError::invalid_webhook(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(BillingError::invalid_webhook("Event timestamp in future"));
        }

        let expected = self.compute_signature(payload, header.timestamp);
        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| bool::from(expected.as_slice().ct_eq(provided.as_slice())));

        if !matched {
            tracing::warn!("Invalid webhook signature");
            return Err(BillingError::invalid_webhook("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a payload into the port's event type without checking the signature.
    ///
    /// Only call this on bytes that were already verified.
    pub fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, BillingError> {
        let raw: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            BillingError::invalid_webhook(format!("Invalid JSON: {}", e))
        })?;

        let stripe_event: StripeWebhookEvent =
            serde_json::from_value(raw.clone()).map_err(|e| {
                tracing::warn!(error = %e, "Webhook payload is not a Stripe event");
                BillingError::invalid_webhook(format!("Invalid event: {}", e))
            })?;

        if self.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event in production"
            );
            return Err(BillingError::invalid_webhook(
                "Test mode events not allowed in production",
            ));
        }

        let data = stripe_event.extract_data()?;

        Ok(WebhookEvent {
            event_type: WebhookEventType::from_stripe(&stripe_event.event_type),
            id: stripe_event.id,
            data,
            created_at: stripe_event.created,
            payload: raw,
        })
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("require_livemode", &self.require_livemode)
            .finish_non_exhaustive()
    }
}
