//! PostgreSQL adapters - Database implementations for the storage ports.
//!
//! - `PostgresSubscriptionStore` - one mirrored subscription row per user
//! - `PostgresWebhookEventRepository` - ledger of finished webhook events
//! - `PostgresUserDirectory` - read-only view of the platform's users

mod subscription_store;
mod user_directory;
mod webhook_event_repository;

pub use subscription_store::PostgresSubscriptionStore;
pub use user_directory::PostgresUserDirectory;
pub use webhook_event_repository::PostgresWebhookEventRepository;
