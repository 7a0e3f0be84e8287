//! GetBillingPortalUrlHandler - Query handler for the self-service billing
//! portal link.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionError;
use crate::ports::{BillingProvider, SubscriptionStore};

use super::provider_call::{call_provider, DEFAULT_PROVIDER_TIMEOUT};

/// Query for a portal link.
#[derive(Debug, Clone)]
pub struct GetBillingPortalUrlQuery {
    pub user_id: UserId,
}

/// Result carrying the portal link.
#[derive(Debug, Clone)]
pub struct GetBillingPortalUrlResult {
    pub url: String,
}

/// Handler for portal links. Returns to `return_url` when the user is done.
pub struct GetBillingPortalUrlHandler {
    store: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn BillingProvider>,
    return_url: String,
    provider_timeout: Duration,
}

impl GetBillingPortalUrlHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        provider: Arc<dyn BillingProvider>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            return_url: return_url.into(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub async fn handle(
        &self,
        query: GetBillingPortalUrlQuery,
    ) -> Result<GetBillingPortalUrlResult, SubscriptionError> {
        let record = self
            .store
            .get(&query.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::NoSubscription(query.user_id.clone()))?;

        let session = call_provider(
            self.provider_timeout,
            "create_billing_portal_session",
            self.provider
                .create_billing_portal_session(&record.customer_id, &self.return_url),
        )
        .await?;

        Ok(GetBillingPortalUrlResult { url: session.url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::adapters::stripe::MockBillingProvider;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::SubscriptionRecord;
    use crate::ports::Customer;

    const RETURN_URL: &str = "https://app.example.com/settings/billing";

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[tokio::test]
    async fn returns_portal_url_for_customer() {
        let store = InMemorySubscriptionStore::new();
        store.seed(SubscriptionRecord::new(user(), "cus_1", Timestamp::now()));
        let provider = MockBillingProvider::new();
        provider.add_customer(Customer {
            id: "cus_1".to_string(),
            email: Some("ada@example.com".to_string()),
            name: Some("Ada".to_string()),
            created_at: 0,
        });
        let handler = GetBillingPortalUrlHandler::new(
            Arc::new(store),
            Arc::new(provider.clone()),
            RETURN_URL,
        );

        let result = handler
            .handle(GetBillingPortalUrlQuery { user_id: user() })
            .await
            .unwrap();

        assert!(result.url.starts_with("https://billing.stripe.com/"));
        let call = &provider.calls()[0];
        assert_eq!(call.method, "create_billing_portal_session");
        assert_eq!(call.args, vec!["cus_1".to_string(), RETURN_URL.to_string()]);
    }

    #[tokio::test]
    async fn no_record_is_no_subscription() {
        let provider = MockBillingProvider::new();
        let handler = GetBillingPortalUrlHandler::new(
            Arc::new(InMemorySubscriptionStore::new()),
            Arc::new(provider.clone()),
            RETURN_URL,
        );

        let err = handler
            .handle(GetBillingPortalUrlQuery { user_id: user() })
            .await
            .unwrap_err();

        assert_eq!(err, SubscriptionError::NoSubscription(user()));
        assert!(provider.calls().is_empty());
    }
}
