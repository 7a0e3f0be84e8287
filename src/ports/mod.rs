//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `BillingProvider` - Stripe customers, subscriptions, invoices and webhooks
//! - `SubscriptionStore` - Persisted subscription records, one per user
//! - `WebhookEventRepository` - Ledger of processed webhook events
//! - `UserDirectory` - Read access to user names and emails

mod billing_provider;
mod subscription_store;
mod user_directory;
mod webhook_event_repository;

pub use billing_provider::{
    BillingError, BillingErrorCode, BillingProvider, CreateCustomerRequest,
    CreateSubscriptionRequest, CreatedSubscription, Customer, Invoice, PaymentIntent,
    PortalSession, Price, ProviderSubscription, WebhookEvent, WebhookEventData,
    WebhookEventType,
};
pub use subscription_store::{InsertOutcome, SubscriptionStore};
pub use user_directory::{UserDirectory, UserProfile};
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
