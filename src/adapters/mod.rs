//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `stripe` - Stripe REST client, webhook verification and a stateful mock
//! - `postgres` - Subscription store, webhook ledger and user directory on PostgreSQL
//! - `memory` - In-memory store, ledger and directory for tests and local runs
//! - `http` - Axum routes for the subscription API and Stripe webhooks

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;

pub use memory::{InMemorySubscriptionStore, InMemoryUserDirectory, InMemoryWebhookEventRepository};
pub use postgres::{PostgresSubscriptionStore, PostgresUserDirectory, PostgresWebhookEventRepository};
pub use stripe::{MockBillingProvider, StripeBillingAdapter, StripeConfig};
