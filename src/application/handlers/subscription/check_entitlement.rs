//! CheckEntitlementHandler - Query handler for premium access.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::is_entitled;
use crate::ports::SubscriptionStore;

/// Query to check if a user may read premium content.
#[derive(Debug, Clone)]
pub struct CheckEntitlementQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckEntitlementResult {
    pub entitled: bool,
}

/// Handler for entitlement checks.
///
/// This is on the read path of every premium post, so it never fails: a
/// store error is logged and answered with "not entitled".
pub struct CheckEntitlementHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl CheckEntitlementHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: CheckEntitlementQuery) -> CheckEntitlementResult {
        self.handle_at(query, Timestamp::now()).await
    }

    pub async fn handle_at(
        &self,
        query: CheckEntitlementQuery,
        now: Timestamp,
    ) -> CheckEntitlementResult {
        let entitled = match self.store.get(&query.user_id).await {
            Ok(record) => is_entitled(record.as_ref(), now),
            Err(err) => {
                tracing::error!(
                    user_id = %query.user_id,
                    error = %err,
                    "Entitlement lookup failed, denying access"
                );
                false
            }
        };

        CheckEntitlementResult { entitled }
    }
}
