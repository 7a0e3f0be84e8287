//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).

pub mod handlers;

pub use handlers::subscription::{
    // Commands
    ApplyProviderEventHandler, BeginCheckoutCommand, BeginCheckoutHandler, EnsureCustomerCommand,
    EnsureCustomerHandler, HandleBillingWebhookCommand, HandleBillingWebhookHandler, WebhookAck,
    // Queries
    CheckEntitlementHandler, CheckEntitlementQuery, GateContentHandler, GateContentQuery,
    GetBillingPortalUrlHandler, GetBillingPortalUrlQuery, GetSubscriptionHandler,
    GetSubscriptionInfoHandler, GetSubscriptionInfoQuery, GetSubscriptionQuery,
    ListPricesHandler,
};
