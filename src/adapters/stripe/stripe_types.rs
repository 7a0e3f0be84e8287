//! Stripe wire types.
//!
//! These types mirror Stripe JSON as it arrives in webhook payloads and API
//! responses, and convert into the billing port's provider-neutral types.
//! Field shapes follow the API version pinned by [`STRIPE_API_VERSION`].

use serde::{Deserialize, Serialize};

use crate::domain::subscription::SubscriptionStatus;
use crate::ports::{
    BillingError, Customer, Invoice, PaymentIntent, Price, ProviderSubscription,
    WebhookEventData, WebhookEventType,
};

/// API version sent with every request so response shapes stay stable.
pub const STRIPE_API_VERSION: &str = "2024-06-20";

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureParseError {
    /// Header is empty or missing.
    MissingHeader,
    /// Missing timestamp component (t=...).
    MissingTimestamp,
    /// Missing v1 signature component.
    MissingV1Signature,
    /// Invalid timestamp format.
    InvalidTimestamp,
    /// Invalid signature format (not valid hex).
    InvalidSignatureFormat,
}

impl std::fmt::Display for SignatureParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "Missing Stripe-Signature header"),
            Self::MissingTimestamp => write!(f, "Missing timestamp (t=) in signature"),
            Self::MissingV1Signature => write!(f, "Missing v1 signature in header"),
            Self::InvalidTimestamp => write!(f, "Invalid timestamp format"),
            Self::InvalidSignatureFormat => write!(f, "Invalid signature format (not valid hex)"),
        }
    }
}

impl std::error::Error for SignatureParseError {}

/// Parsed Stripe-Signature header.
///
/// Format: `t=<timestamp>,v1=<signature>[,v1=<signature>...]`. Stripe sends
/// several `v1` entries while a signing secret is being rolled; any one of
/// them matching is enough. Legacy `v0` entries are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when Stripe signed the payload.
    pub timestamp: i64,

    /// Decoded HMAC-SHA256 signatures.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.trim().is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    let bytes = hex::decode(value.trim())
                        .map_err(|_| SignatureParseError::InvalidSignatureFormat)?;
                    v1_signatures.push(bytes);
                }
                // Forward compatibility: unknown schemes are skipped.
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureParseError::MissingTimestamp)?;
        if v1_signatures.is_empty() {
            return Err(SignatureParseError::MissingV1Signature);
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Envelope Types
// ════════════════════════════════════════════════════════════════════════════════

/// Field that holds an ID, or the full object when requested via `expand[]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T> Expandable<T> {
    pub fn as_object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(object) => Some(object),
        }
    }
}

impl Expandable<StripeInvoice> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(invoice) => &invoice.id,
        }
    }
}

impl Expandable<StripePaymentIntent> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(intent) => &intent.id,
        }
    }
}

/// Paginated list response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Raw Stripe webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type (e.g., "invoice.payment_succeeded").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    /// Whether this is a live or test event.
    #[serde(default)]
    pub livemode: bool,

    pub api_version: Option<String>,
}

/// Event data container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,
}

impl StripeWebhookEvent {
    /// Pull the identifiers the reconciler needs out of the embedded object.
    ///
    /// Only ids are taken from the payload; the subscription itself is
    /// re-fetched later.
    pub fn extract_data(&self) -> Result<WebhookEventData, BillingError> {
        match WebhookEventType::from_stripe(&self.event_type) {
            WebhookEventType::CheckoutSessionCompleted => {
                let session: StripeCheckoutSession =
                    serde_json::from_value(self.data.object.clone()).map_err(|e| {
                        BillingError::invalid_webhook(format!("Invalid checkout session: {}", e))
                    })?;
                Ok(WebhookEventData::Checkout {
                    session_id: session.id,
                    customer_id: session.customer,
                    subscription_id: session.subscription,
                })
            }
            WebhookEventType::InvoicePaymentSucceeded | WebhookEventType::InvoicePaid => {
                let invoice: StripeEventInvoice =
                    serde_json::from_value(self.data.object.clone()).map_err(|e| {
                        BillingError::invalid_webhook(format!("Invalid invoice: {}", e))
                    })?;
                Ok(WebhookEventData::Invoice {
                    invoice_id: invoice.id,
                    customer_id: invoice.customer,
                    subscription_id: invoice.subscription,
                })
            }
            WebhookEventType::SubscriptionUpdated => {
                let sub: StripeEventSubscription =
                    serde_json::from_value(self.data.object.clone()).map_err(|e| {
                        BillingError::invalid_webhook(format!("Invalid subscription: {}", e))
                    })?;
                Ok(WebhookEventData::Subscription {
                    subscription_id: sub.id,
                    customer_id: sub.customer,
                })
            }
            WebhookEventType::Unknown(_) => Ok(WebhookEventData::Raw),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Checkout Session object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Unique session identifier (cs_...).
    pub id: String,

    pub customer: Option<String>,

    /// Set for `mode = subscription` sessions only.
    pub subscription: Option<String>,

    pub payment_status: Option<String>,

    /// Payment mode (payment, setup, subscription).
    pub mode: Option<String>,
}

/// Invoice as embedded in webhook events; only references are read.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventInvoice {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
}

/// Subscription as embedded in webhook events; only references are read.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventSubscription {
    pub id: String,
    pub customer: String,
}

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    pub email: Option<String>,

    pub name: Option<String>,

    /// Unix timestamp of creation.
    pub created: i64,

    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

impl From<StripeCustomer> for Customer {
    fn from(customer: StripeCustomer) -> Self {
        Customer {
            id: customer.id,
            email: customer.email,
            name: customer.name,
            created_at: customer.created,
        }
    }
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer ID owning this subscription.
    pub customer: String,

    /// Subscription status.
    pub status: String,

    /// Current period start (Unix timestamp).
    pub current_period_start: Option<i64>,

    /// Current period end (Unix timestamp).
    pub current_period_end: Option<i64>,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    /// Invoice ID, or the invoice when expanded.
    pub latest_invoice: Option<Expandable<StripeInvoice>>,

    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

impl StripeSubscription {
    /// Client secret of the first payment, present when the subscription was
    /// fetched with `expand[]=latest_invoice.payment_intent`.
    pub fn expanded_client_secret(&self) -> Option<String> {
        self.latest_invoice
            .as_ref()?
            .as_object()?
            .payment_intent
            .as_ref()?
            .as_object()?
            .client_secret
            .clone()
    }

    fn period(&self) -> Option<(i64, i64)> {
        let item = self.items.data.first();
        let start = self
            .current_period_start
            .or_else(|| item.and_then(|i| i.current_period_start))?;
        let end = self
            .current_period_end
            .or_else(|| item.and_then(|i| i.current_period_end))?;
        Some((start, end))
    }
}

impl TryFrom<StripeSubscription> for ProviderSubscription {
    type Error = BillingError;

    fn try_from(sub: StripeSubscription) -> Result<Self, Self::Error> {
        let (current_period_start, current_period_end) = sub.period().ok_or_else(|| {
            BillingError::provider(format!("Subscription {} has no current period", sub.id))
        })?;

        Ok(ProviderSubscription {
            price_id: sub.items.data.first().map(|item| item.price.id.clone()),
            latest_invoice_id: sub.latest_invoice.as_ref().map(|i| i.id().to_string()),
            status: SubscriptionStatus::from_provider(&sub.status),
            id: sub.id,
            customer_id: sub.customer,
            current_period_start,
            current_period_end,
            cancel_at_period_end: sub.cancel_at_period_end,
        })
    }
}

/// Subscription items container.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeSubscriptionItems {
    #[serde(default)]
    pub data: Vec<StripeSubscriptionItem>,
}

/// Single subscription item.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,

    pub price: StripePrice,

    /// Newer API versions report the period per item.
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
}

/// Stripe Price object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    /// Price ID.
    pub id: String,

    pub lookup_key: Option<String>,

    /// Product ID, or the product when expanded.
    pub product: Option<Expandable<StripeProduct>>,

    /// Unit amount in the currency's minor unit.
    pub unit_amount: Option<i64>,

    /// Currency (lowercase, e.g., "jpy").
    pub currency: String,

    pub recurring: Option<StripePriceRecurring>,
}

impl From<StripePrice> for Price {
    fn from(price: StripePrice) -> Self {
        Price {
            product_name: price
                .product
                .as_ref()
                .and_then(|p| p.as_object())
                .map(|p| p.name.clone()),
            interval: price.recurring.map(|r| r.interval),
            id: price.id,
            lookup_key: price.lookup_key,
            unit_amount: price.unit_amount,
            currency: price.currency,
        }
    }
}

/// Price recurring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePriceRecurring {
    /// Billing interval (day, week, month, year).
    pub interval: String,

    #[serde(default = "default_interval_count")]
    pub interval_count: i32,
}

fn default_interval_count() -> i32 {
    1
}

/// Stripe Product object (only when expanded).
#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: Option<String>,

    pub subscription: Option<String>,

    /// Invoice status (draft, open, paid, void, uncollectible).
    pub status: Option<String>,

    /// Payment intent ID, or the intent when expanded.
    pub payment_intent: Option<Expandable<StripePaymentIntent>>,
}

impl From<StripeInvoice> for Invoice {
    fn from(invoice: StripeInvoice) -> Self {
        Invoice {
            payment_intent_id: invoice.payment_intent.as_ref().map(|p| p.id().to_string()),
            id: invoice.id,
            customer_id: invoice.customer.unwrap_or_default(),
            subscription_id: invoice.subscription,
            status: invoice.status,
        }
    }
}

/// Stripe PaymentIntent object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

impl From<StripePaymentIntent> for PaymentIntent {
    fn from(intent: StripePaymentIntent) -> Self {
        PaymentIntent {
            id: intent.id,
            status: intent.status,
            client_secret: intent.client_secret,
        }
    }
}

/// Billing portal session.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePortalSession {
    pub id: String,
    pub url: String,
}
