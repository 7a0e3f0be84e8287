//! HTTP adapter for subscription endpoints.
//!
//! Exposes the subscription lifecycle via REST API:
//! - `GET /api/subscription` - Stored subscription for the billing settings page
//! - `GET /api/subscription/entitlement` - Premium entitlement check
//! - `GET /api/subscription/active` - Active Stripe subscriptions
//! - `POST /api/subscription/portal` - Open a Stripe customer portal session
//! - `GET /api/subscription/prices` - Pricing page prices
//! - `POST /api/subscription/checkout` - Begin or resume checkout
//! - `POST /api/webhooks/stripe` - Handle Stripe webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{
    AuthenticatedUser, BillingSettings, Locale, SubscriptionApiError, SubscriptionAppState,
    STRIPE_SIGNATURE_HEADER,
};
pub use routes::{subscription_router, subscription_routes, webhook_routes};
