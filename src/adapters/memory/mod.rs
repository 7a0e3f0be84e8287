//! In-memory adapters for tests and local development.
//!
//! - `InMemorySubscriptionStore` - `SubscriptionStore` with the same
//!   uniqueness guarantees as the PostgreSQL table
//! - `InMemoryWebhookEventRepository` - webhook ledger
//! - `InMemoryUserDirectory` - seeded user profiles

mod subscription_store;
mod user_directory;
mod webhook_event_repository;

pub use subscription_store::InMemorySubscriptionStore;
pub use user_directory::InMemoryUserDirectory;
pub use webhook_event_repository::InMemoryWebhookEventRepository;

use crate::domain::foundation::{DomainError, ErrorCode};

fn lock_poisoned(what: &str) -> DomainError {
    DomainError::new(ErrorCode::InternalError, format!("{} lock poisoned", what))
}
