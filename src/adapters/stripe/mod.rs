//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port for Stripe, including:
//! - Customer creation
//! - Incomplete-first subscriptions and payment secret lookup
//! - Price listing and billing portal sessions
//! - Webhook signature verification
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`

mod mock_billing_provider;
mod stripe_adapter;
mod stripe_types;
mod webhook_verifier;

pub use mock_billing_provider::{MethodCall, MockBillingProvider};
pub use stripe_adapter::{StripeBillingAdapter, StripeConfig};
pub use stripe_types::{
    Expandable, SignatureHeader, SignatureParseError, StripeCheckoutSession, StripeCustomer,
    StripeInvoice, StripePaymentIntent, StripePrice, StripeSubscription, StripeWebhookEvent,
    STRIPE_API_VERSION,
};
pub use webhook_verifier::{WebhookVerifier, MAX_FUTURE_TOLERANCE_SECS, MAX_TIMESTAMP_AGE_SECS};
