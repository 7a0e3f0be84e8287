//! Billing provider port for the external recurring-payments service.
//!
//! Defines the contract the subscription reconciler needs from Stripe.
//! Implementations are constructed explicitly and injected as
//! `Arc<dyn BillingProvider>`, so tests can swap in a fake.
//!
//! # Design
//!
//! - **Re-fetch friendly**: every object can be retrieved by id, so webhook
//!   processing never has to trust embedded payloads
//! - **Idempotent**: create calls accept an idempotency key
//! - **Transient-aware**: errors say whether a retry can help

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    ProviderEventKind, SubscriptionError, SubscriptionPatch, SubscriptionStatus,
};

/// Port for billing provider integrations.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Create a customer in the billing system.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, BillingError>;

    /// Create a subscription whose first payment is left incomplete.
    ///
    /// The response carries the first invoice's payment secret when the
    /// provider produced one.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, BillingError>;

    /// Get subscription by provider ID.
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, BillingError>;

    /// Get invoice by provider ID.
    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingError>;

    /// Get payment intent by provider ID.
    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, BillingError>;

    /// List a customer's subscriptions in the given status.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: &SubscriptionStatus,
    ) -> Result<Vec<ProviderSubscription>, BillingError>;

    /// List active prices carrying any of the given lookup keys.
    async fn list_prices(&self, lookup_keys: &[String]) -> Result<Vec<Price>, BillingError>;

    /// Create a self-service billing portal session.
    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, BillingError>;

    /// Verify a webhook signature and parse the event.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError>;
}

// ════════════════════════════════════════════════════════════════════════════════
// Requests and Objects
// ════════════════════════════════════════════════════════════════════════════════

/// Request to create a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomerRequest {
    /// Platform user, stored in customer metadata.
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub idempotency_key: Option<String>,
}

/// Customer in the billing system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Provider's customer ID (cus_...).
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Unix timestamp.
    pub created_at: i64,
}

/// Request to create a subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub customer_id: String,
    pub price_id: String,
    pub idempotency_key: Option<String>,
}

/// Subscription as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSubscription {
    /// Provider's subscription ID (sub_...).
    pub id: String,
    pub customer_id: String,
    pub status: SubscriptionStatus,
    /// Price of the first subscription item.
    pub price_id: Option<String>,
    /// Unix timestamp.
    pub current_period_start: i64,
    /// Unix timestamp.
    pub current_period_end: i64,
    pub cancel_at_period_end: bool,
    pub latest_invoice_id: Option<String>,
}

impl ProviderSubscription {
    /// Mirrored record fields, copied verbatim.
    pub fn to_patch(&self) -> SubscriptionPatch {
        SubscriptionPatch {
            subscription_id: self.id.clone(),
            price_id: self.price_id.clone(),
            status: self.status.clone(),
            current_period_start: Timestamp::from_unix_secs(self.current_period_start),
            current_period_end: Timestamp::from_unix_secs(self.current_period_end),
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }
}

/// A newly created subscription and the secret for its first payment.
#[derive(Debug, Clone)]
pub struct CreatedSubscription {
    pub subscription: ProviderSubscription,
    pub client_secret: Option<String>,
}

/// Invoice reference needed to resume an unfinished payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub status: Option<String>,
    pub payment_intent_id: Option<String>,
}

/// Payment intent carrying the client secret for the payment form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

/// Price offered on the pricing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub id: String,
    pub lookup_key: Option<String>,
    /// Amount in the currency's minor unit.
    pub unit_amount: Option<i64>,
    pub currency: String,
    /// Billing interval (day, week, month, year) for recurring prices.
    pub interval: Option<String>,
    pub product_name: Option<String>,
}

/// Customer portal session.
#[derive(Debug, Clone)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Events
// ════════════════════════════════════════════════════════════════════════════════

/// Verified webhook event.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Provider's event ID (evt_...), used for dedupe.
    pub id: String,
    pub event_type: WebhookEventType,
    pub data: WebhookEventData,
    /// Unix timestamp.
    pub created_at: i64,
    /// Full event body, kept for the audit ledger.
    pub payload: serde_json::Value,
}

/// Webhook event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    InvoicePaymentSucceeded,
    InvoicePaid,
    SubscriptionUpdated,
    Unknown(String),
}

impl WebhookEventType {
    pub fn from_stripe(value: &str) -> Self {
        match value {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.paid" => Self::InvoicePaid,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaid => "invoice.paid",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::Unknown(value) => value,
        }
    }

    /// The reconciler event this webhook maps to, if any.
    pub fn provider_event_kind(&self) -> Option<ProviderEventKind> {
        match self {
            Self::CheckoutSessionCompleted => Some(ProviderEventKind::CheckoutCompleted),
            Self::InvoicePaymentSucceeded | Self::InvoicePaid => {
                Some(ProviderEventKind::InvoicePaid)
            }
            Self::SubscriptionUpdated => Some(ProviderEventKind::SubscriptionUpdated),
            Self::Unknown(_) => None,
        }
    }
}

/// Identifiers pulled from the event's embedded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventData {
    Checkout {
        session_id: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    Invoice {
        invoice_id: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    Subscription {
        subscription_id: String,
        customer_id: String,
    },
    /// Event types we do not process.
    Raw,
}

impl WebhookEventData {
    /// Subscription the event refers to. One-off checkouts and invoices have none.
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            WebhookEventData::Checkout {
                subscription_id, ..
            }
            | WebhookEventData::Invoice {
                subscription_id, ..
            } => subscription_id.as_deref(),
            WebhookEventData::Subscription {
                subscription_id, ..
            } => Some(subscription_id),
            WebhookEventData::Raw => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════════

/// Billing provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingError {
    pub code: BillingErrorCode,
    pub message: String,
    /// Provider's own error code (e.g., `resource_missing`).
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl BillingError {
    pub fn new(code: BillingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Override the default retry classification of the code.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::NetworkError, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::Timeout, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::ProviderError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(BillingErrorCode::NotFound, format!("{} not found", resource))
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::InvalidWebhook, message)
    }
}

impl std::fmt::Display for BillingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BillingError {}

impl From<BillingError> for SubscriptionError {
    fn from(err: BillingError) -> Self {
        if err.code == BillingErrorCode::InvalidWebhook {
            return SubscriptionError::InvalidSignature(err.message);
        }
        if err.retryable {
            return SubscriptionError::ProviderUnavailable(err.to_string());
        }
        SubscriptionError::Provider(err.to_string())
    }
}

/// Billing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingErrorCode {
    NetworkError,
    Timeout,
    AuthenticationError,
    CardDeclined,
    NotFound,
    RateLimitExceeded,
    InvalidWebhook,
    ProviderError,
    Unknown,
}

impl BillingErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingErrorCode::NetworkError
                | BillingErrorCode::Timeout
                | BillingErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for BillingErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BillingErrorCode::NetworkError => "network_error",
            BillingErrorCode::Timeout => "timeout",
            BillingErrorCode::AuthenticationError => "authentication_error",
            BillingErrorCode::CardDeclined => "card_declined",
            BillingErrorCode::NotFound => "not_found",
            BillingErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            BillingErrorCode::InvalidWebhook => "invalid_webhook",
            BillingErrorCode::ProviderError => "provider_error",
            BillingErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
