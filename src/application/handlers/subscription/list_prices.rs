//! ListPricesHandler - Query handler for the pricing page.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::subscription::SubscriptionError;
use crate::ports::{BillingProvider, Price};

use super::provider_call::{call_provider, DEFAULT_PROVIDER_TIMEOUT};

/// Result of listing prices.
#[derive(Debug, Clone)]
pub struct ListPricesResult {
    pub prices: Vec<Price>,
}

/// Handler listing the prices behind the configured lookup keys.
pub struct ListPricesHandler {
    provider: Arc<dyn BillingProvider>,
    lookup_keys: Vec<String>,
    provider_timeout: Duration,
}

impl ListPricesHandler {
    pub fn new(provider: Arc<dyn BillingProvider>, lookup_keys: Vec<String>) -> Self {
        Self {
            provider,
            lookup_keys,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub async fn handle(&self) -> Result<ListPricesResult, SubscriptionError> {
        let prices = call_provider(
            self.provider_timeout,
            "list_prices",
            self.provider.list_prices(&self.lookup_keys),
        )
        .await?;

        Ok(ListPricesResult { prices })
    }
}
