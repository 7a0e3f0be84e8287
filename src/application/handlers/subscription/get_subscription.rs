//! GetSubscriptionHandler - Query handler for the billing settings page.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{BillingSummary, SubscriptionError, SubscriptionRecord};
use crate::ports::SubscriptionStore;

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub user_id: UserId,
}

/// Stored record with what the page derives from it.
#[derive(Debug, Clone)]
pub struct GetSubscriptionResult {
    pub record: SubscriptionRecord,
    pub is_entitled: bool,
    pub summary: Option<BillingSummary>,
}

pub struct GetSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl GetSubscriptionHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionQuery,
    ) -> Result<GetSubscriptionResult, SubscriptionError> {
        let record = self
            .store
            .get(&query.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::NoSubscription(query.user_id.clone()))?;

        Ok(GetSubscriptionResult {
            is_entitled: record.is_entitled_at(Timestamp::now()),
            summary: record.billing_summary(),
            record,
        })
    }
}
