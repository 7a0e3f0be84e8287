//! In-memory webhook event ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::ports::{SaveResult, WebhookEventRecord, WebhookEventRepository};

use super::lock_poisoned;

#[derive(Default, Clone)]
pub struct InMemoryWebhookEventRepository {
    events: Arc<Mutex<HashMap<String, WebhookEventRecord>>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in no particular order.
    pub fn records(&self) -> Vec<WebhookEventRecord> {
        self.events
            .lock()
            .map(|events| events.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let events = self.events.lock().map_err(|_| lock_poisoned("webhook ledger"))?;
        Ok(events.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut events = self.events.lock().map_err(|_| lock_poisoned("webhook ledger"))?;
        if events.contains_key(&record.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        events.insert(record.event_id.clone(), record);
        Ok(SaveResult::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::WebhookOutcome;

    #[tokio::test]
    async fn first_save_wins() {
        let repo = InMemoryWebhookEventRepository::new();
        let first = WebhookEventRecord::success("evt_1", "invoice.paid", serde_json::Value::Null);
        let second =
            WebhookEventRecord::ignored("evt_1", "invoice.paid", "late", serde_json::Value::Null);

        assert_eq!(repo.save(first).await.unwrap(), SaveResult::Inserted);
        assert_eq!(repo.save(second).await.unwrap(), SaveResult::AlreadyExists);

        let stored = repo.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.outcome, WebhookOutcome::Success);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn unknown_event_is_absent() {
        let repo = InMemoryWebhookEventRepository::new();
        assert!(repo.find_by_event_id("evt_x").await.unwrap().is_none());
        assert!(repo.is_empty());
    }
}
