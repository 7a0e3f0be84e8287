//! GetSubscriptionInfoHandler - Query handler listing the user's active
//! subscriptions as the provider reports them.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{SubscriptionError, SubscriptionStatus};
use crate::ports::{BillingProvider, ProviderSubscription, SubscriptionStore};

use super::provider_call::{call_provider, DEFAULT_PROVIDER_TIMEOUT};

#[derive(Debug, Clone)]
pub struct GetSubscriptionInfoQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct GetSubscriptionInfoResult {
    pub subscriptions: Vec<ProviderSubscription>,
}

pub struct GetSubscriptionInfoHandler {
    store: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn BillingProvider>,
    provider_timeout: Duration,
}

impl GetSubscriptionInfoHandler {
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
        query: GetSubscriptionInfoQuery,
    ) -> Result<GetSubscriptionInfoResult, SubscriptionError> {
        let record = self
            .store
            .get(&query.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::NoSubscription(query.user_id.clone()))?;

        let subscriptions = call_provider(
            self.provider_timeout,
            "list_subscriptions",
            self.provider
                .list_subscriptions(&record.customer_id, &SubscriptionStatus::Active),
        )
        .await?;

        Ok(GetSubscriptionInfoResult { subscriptions })
    }
}
