//! HTTP DTOs (Data Transfer Objects) for subscription endpoints.
//!
//! These types define the JSON request/response structure for the subscription
//! API. They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::handlers::subscription::{GetSubscriptionResult, WebhookAck};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{BillingSummary, SubscriptionStatus};
use crate::ports::{Price, ProviderSubscription};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to begin checkout for a price.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    /// Stripe price to subscribe to (price_...).
    pub price_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response for checkout; the client confirms the payment with the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub client_secret: String,
    pub subscription_id: String,
}

/// Stored subscription for the billing settings page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub user_id: String,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub status: SubscriptionStatus,
    /// Start of current billing period (ISO 8601).
    pub current_period_start: Option<String>,
    /// End of current billing period (ISO 8601).
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
    pub is_entitled: bool,
    pub summary: Option<BillingSummaryResponse>,
}

/// "Renews on" or "cancels on" line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingSummaryResponse {
    /// `renews_on` or `cancels_on`.
    pub kind: String,
    /// ISO 8601.
    pub on: String,
}

impl From<BillingSummary> for BillingSummaryResponse {
    fn from(summary: BillingSummary) -> Self {
        let (kind, on) = match summary {
            BillingSummary::RenewsOn(on) => ("renews_on", on),
            BillingSummary::CancelsOn(on) => ("cancels_on", on),
        };
        Self {
            kind: kind.to_string(),
            on: rfc3339(on),
        }
    }
}

impl From<GetSubscriptionResult> for SubscriptionResponse {
    fn from(result: GetSubscriptionResult) -> Self {
        let record = result.record;
        Self {
            user_id: record.user_id.to_string(),
            customer_id: record.customer_id,
            subscription_id: record.subscription_id,
            price_id: record.price_id,
            status: record.status,
            current_period_start: record.current_period_start.map(rfc3339),
            current_period_end: record.current_period_end.map(rfc3339),
            cancel_at_period_end: record.cancel_at_period_end,
            is_entitled: result.is_entitled,
            summary: result.summary.map(BillingSummaryResponse::from),
        }
    }
}

/// Response for entitlement check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementResponse {
    pub entitled: bool,
}

/// Active subscription as reported by Stripe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSubscriptionResponse {
    pub id: String,
    pub status: SubscriptionStatus,
    pub price_id: Option<String>,
    /// ISO 8601.
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
}

impl From<ProviderSubscription> for ActiveSubscriptionResponse {
    fn from(subscription: ProviderSubscription) -> Self {
        Self {
            current_period_end: Timestamp::from_unix_secs(subscription.current_period_end)
                .map(rfc3339),
            id: subscription.id,
            status: subscription.status,
            price_id: subscription.price_id,
            cancel_at_period_end: subscription.cancel_at_period_end,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSubscriptionsResponse {
    pub subscriptions: Vec<ActiveSubscriptionResponse>,
}

/// Response for customer portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalResponse {
    /// The Stripe customer portal URL.
    pub url: String,
}

/// Price shown on the pricing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceResponse {
    pub id: String,
    pub lookup_key: Option<String>,
    /// Amount in the currency's minor unit.
    pub unit_amount: Option<i64>,
    pub currency: String,
    pub interval: Option<String>,
    pub product_name: Option<String>,
}

impl From<Price> for PriceResponse {
    fn from(price: Price) -> Self {
        Self {
            id: price.id,
            lookup_key: price.lookup_key,
            unit_amount: price.unit_amount,
            currency: price.currency,
            interval: price.interval,
            product_name: price.product_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesResponse {
    pub prices: Vec<PriceResponse>,
}

/// Acknowledgement returned to Stripe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub event_id: String,
    /// `processed`, `ignored` or `duplicate`.
    pub outcome: String,
}

impl From<WebhookAck> for WebhookAckResponse {
    fn from(ack: WebhookAck) -> Self {
        let outcome = match &ack {
            WebhookAck::Processed { .. } => "processed",
            WebhookAck::Ignored { .. } => "ignored",
            WebhookAck::Duplicate { .. } => "duplicate",
        };
        Self {
            received: true,
            event_id: ack.event_id().to_string(),
            outcome: outcome.to_string(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response DTO
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether repeating the request later may succeed.
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

fn rfc3339(ts: Timestamp) -> String {
    ts.as_datetime().to_rfc3339()
}
