//! EnsureCustomerHandler - Command handler that gives a user exactly one
//! billing customer.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{SubscriptionError, SubscriptionRecord};
use crate::ports::{BillingProvider, CreateCustomerRequest, SubscriptionStore};

use super::provider_call::{call_provider, DEFAULT_PROVIDER_TIMEOUT};

/// Command to make sure the user has a billing customer.
#[derive(Debug, Clone)]
pub struct EnsureCustomerCommand {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// Result of ensuring a customer.
#[derive(Debug, Clone)]
pub struct EnsureCustomerResult {
    /// The user's record, freshly created or already present.
    pub record: SubscriptionRecord,
    /// Whether this call created the record.
    pub created: bool,
}

impl EnsureCustomerResult {
    pub fn customer_id(&self) -> &str {
        &self.record.customer_id
    }
}

/// Handler for ensuring a billing customer.
///
/// The provider call carries an idempotency key derived from the user id, so
/// concurrent first calls collapse onto one provider customer. The store's
/// insert-if-absent then decides which caller's insert wins; the loser reads
/// the winner's record.
pub struct EnsureCustomerHandler {
    store: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn BillingProvider>,
    provider_timeout: Duration,
}

impl EnsureCustomerHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, provider: Arc<dyn BillingProvider>) -> Self {
        Self {
            store,
            provider,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub async fn handle(
        &self,
        cmd: EnsureCustomerCommand,
    ) -> Result<EnsureCustomerResult, SubscriptionError> {
        // 1. Existing record wins
        if let Some(record) = self.store.get(&cmd.user_id).await? {
            return Ok(EnsureCustomerResult {
                record,
                created: false,
            });
        }

        // 2. Create the provider customer
        let customer = call_provider(
            self.provider_timeout,
            "create_customer",
            self.provider.create_customer(CreateCustomerRequest {
                user_id: cmd.user_id.clone(),
                name: cmd.name,
                email: cmd.email,
                idempotency_key: Some(customer_idempotency_key(&cmd.user_id)),
            }),
        )
        .await?;

        // 3. Insert unless a concurrent caller got there first
        let record = SubscriptionRecord::new(cmd.user_id.clone(), customer.id, Timestamp::now());
        let outcome = self.store.insert_if_absent(&record).await?;
        let created = outcome.was_inserted();

        if created {
            tracing::info!(
                user_id = %cmd.user_id,
                customer_id = %record.customer_id,
                "Created billing customer"
            );
        } else {
            tracing::debug!(user_id = %cmd.user_id, "Billing customer created concurrently");
        }

        Ok(EnsureCustomerResult {
            record: outcome.into_record(),
            created,
        })
    }
}

fn customer_idempotency_key(user_id: &UserId) -> String {
    format!("customer-{}", user_id)
}
