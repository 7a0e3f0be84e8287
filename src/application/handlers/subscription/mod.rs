//! Subscription handlers.
//!
//! Command and query handlers for the subscription lifecycle:
//!
//! ## Commands
//! - Ensuring a user has a billing customer
//! - Beginning (or resuming) checkout
//! - Applying provider events to the mirrored record
//! - Processing Stripe webhooks
//!
//! ## Queries
//! - Billing portal link
//! - Prices for the pricing page
//! - Active provider subscriptions
//! - Stored subscription for the billing settings page
//! - Premium entitlement and content gating

mod apply_provider_event;
mod begin_checkout;
mod check_entitlement;
mod ensure_customer;
mod gate_content;
mod get_billing_portal_url;
mod get_subscription;
mod get_subscription_info;
mod handle_billing_webhook;
mod list_prices;
mod provider_call;

pub use provider_call::DEFAULT_PROVIDER_TIMEOUT;

// Commands
pub use apply_provider_event::{ApplyProviderEventHandler, ApplyProviderEventResult};
pub use begin_checkout::{BeginCheckoutCommand, BeginCheckoutHandler, BeginCheckoutResult};
pub use ensure_customer::{EnsureCustomerCommand, EnsureCustomerHandler, EnsureCustomerResult};
pub use handle_billing_webhook::{
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, WebhookAck,
};

// Queries
pub use check_entitlement::{
    CheckEntitlementHandler, CheckEntitlementQuery, CheckEntitlementResult,
};
pub use gate_content::{GateContentHandler, GateContentQuery};
pub use get_billing_portal_url::{
    GetBillingPortalUrlHandler, GetBillingPortalUrlQuery, GetBillingPortalUrlResult,
};
pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery, GetSubscriptionResult};
pub use get_subscription_info::{
    GetSubscriptionInfoHandler, GetSubscriptionInfoQuery, GetSubscriptionInfoResult,
};
pub use list_prices::{ListPricesHandler, ListPricesResult};
