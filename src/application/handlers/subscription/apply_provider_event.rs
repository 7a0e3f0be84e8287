//! ApplyProviderEventHandler - Command handler that merges a provider event
//! into the mirrored record.

use std::sync::Arc;

use crate::domain::subscription::{ProviderEvent, SubscriptionError, SubscriptionRecord};
use crate::ports::SubscriptionStore;

/// Result of applying an event.
#[derive(Debug, Clone)]
pub struct ApplyProviderEventResult {
    pub record: SubscriptionRecord,
    /// False when the event described a subscription the record had already
    /// replaced, leaving the record as it was.
    pub applied: bool,
}

/// Handler for applying provider events.
///
/// The patch overwrites every mirrored field, so applying the same event
/// again is a no-op and events never need to arrive in order. The handler
/// trusts the snapshot it is given: an older snapshot rolls the record back
/// until the next event lands. The one exception is the final state of a
/// subscription the customer has since replaced, which is skipped.
pub struct ApplyProviderEventHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl ApplyProviderEventHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        event: ProviderEvent,
    ) -> Result<ApplyProviderEventResult, SubscriptionError> {
        // 1. Locate the customer's record
        let current = self
            .store
            .find_by_customer_id(&event.customer_id)
            .await?
            .ok_or_else(|| unknown_customer(&event))?;

        // 2. An ended predecessor must not overwrite the live subscription
        if event.patch.ends_replaced_subscription(&current) {
            tracing::info!(
                event_id = %event.event_id,
                user_id = %current.user_id,
                subscription_id = %event.patch.subscription_id,
                current_subscription_id = ?current.subscription_id,
                "Skipped event for replaced subscription"
            );
            return Ok(ApplyProviderEventResult {
                record: current,
                applied: false,
            });
        }

        // 3. Overwrite the mirrored fields
        let record = self
            .store
            .update_by_customer_id(&event.customer_id, &event.patch)
            .await?
            .ok_or_else(|| unknown_customer(&event))?;

        tracing::info!(
            event_id = %event.event_id,
            kind = ?event.kind,
            user_id = %record.user_id,
            subscription_id = %event.patch.subscription_id,
            status = %record.status,
            "Applied provider event"
        );

        Ok(ApplyProviderEventResult {
            record,
            applied: true,
        })
    }
}

fn unknown_customer(event: &ProviderEvent) -> SubscriptionError {
    tracing::warn!(
        event_id = %event.event_id,
        customer_id = %event.customer_id,
        "No subscription record for customer yet"
    );
    SubscriptionError::UnknownCustomer(event.customer_id.clone())
}
