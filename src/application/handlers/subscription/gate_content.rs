//! GateContentHandler - Query handler deciding how much of a post a reader
//! sees.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::subscription::ContentAccess;
use crate::ports::SubscriptionStore;

use super::check_entitlement::{CheckEntitlementHandler, CheckEntitlementQuery};

/// Query to gate one post for one reader.
#[derive(Debug, Clone)]
pub struct GateContentQuery {
    /// Signed-in reader, if any.
    pub viewer: Option<UserId>,
    pub author_id: UserId,
    pub content: String,
    pub is_premium: bool,
}

pub struct GateContentHandler {
    entitlement: CheckEntitlementHandler,
}

impl GateContentHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            entitlement: CheckEntitlementHandler::new(store),
        }
    }

    pub async fn handle(&self, query: GateContentQuery) -> ContentAccess {
        let viewer_is_author = query.viewer.as_ref() == Some(&query.author_id);

        // Free posts and authors never need a store read
        let entitled = match &query.viewer {
            Some(viewer) if query.is_premium && !viewer_is_author => {
                self.entitlement
                    .handle(CheckEntitlementQuery {
                        user_id: viewer.clone(),
                    })
                    .await
                    .entitled
            }
            _ => false,
        };

        ContentAccess::evaluate(&query.content, query.is_premium, viewer_is_author, entitled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::{
        SubscriptionPatch, SubscriptionRecord, SubscriptionStatus, PREVIEW_CHARS,
    };

    fn author() -> UserId {
        UserId::new("author").unwrap()
    }

    fn reader() -> UserId {
        UserId::new("reader").unwrap()
    }

    fn long_post() -> String {
        "x".repeat(PREVIEW_CHARS * 3)
    }

    fn query(viewer: Option<UserId>, is_premium: bool) -> GateContentQuery {
        GateContentQuery {
            viewer,
            author_id: author(),
            content: long_post(),
            is_premium,
        }
    }

    fn subscribed_store() -> InMemorySubscriptionStore {
        let now = Timestamp::now();
        let mut record = SubscriptionRecord::new(reader(), "cus_reader", now);
        record.apply(
            &SubscriptionPatch {
                subscription_id: "sub_1".to_string(),
                price_id: None,
                status: SubscriptionStatus::Active,
                current_period_start: Some(now),
                current_period_end: Some(now.add_days(30).unwrap()),
                cancel_at_period_end: false,
            },
            now,
        );
        let store = InMemorySubscriptionStore::new();
        store.seed(record);
        store
    }

    #[tokio::test]
    async fn anonymous_reader_gets_preview_of_premium_post() {
        let handler = GateContentHandler::new(Arc::new(subscribed_store()));

        match handler.handle(query(None, true)).await {
            ContentAccess::Preview { excerpt } => assert_eq!(excerpt.chars().count(), PREVIEW_CHARS),
            ContentAccess::Full => panic!("expected preview"),
        }
    }

    #[tokio::test]
    async fn subscriber_gets_full_post() {
        let handler = GateContentHandler::new(Arc::new(subscribed_store()));

        assert!(handler.handle(query(Some(reader()), true)).await.is_full());
    }

    #[tokio::test]
    async fn author_reads_own_post_without_subscription() {
        let store = InMemorySubscriptionStore::new();
        store.fail_all("should not be read");
        let handler = GateContentHandler::new(Arc::new(store));

        assert!(handler.handle(query(Some(author()), true)).await.is_full());
    }

    #[tokio::test]
    async fn free_post_is_full_for_everyone() {
        let handler = GateContentHandler::new(Arc::new(InMemorySubscriptionStore::new()));

        assert!(handler.handle(query(None, false)).await.is_full());
    }

    #[tokio::test]
    async fn store_failure_degrades_to_preview() {
        let store = subscribed_store();
        store.fail_all("connection refused");
        let handler = GateContentHandler::new(Arc::new(store));

        assert!(!handler.handle(query(Some(reader()), true)).await.is_full());
    }
}
