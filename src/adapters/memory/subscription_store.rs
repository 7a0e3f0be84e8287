//! In-memory subscription store.
//!
//! Every operation holds one lock for its whole read-modify-write, which gives
//! the same per-row atomicity the PostgreSQL adapter gets from single
//! statements.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::subscription::{SubscriptionPatch, SubscriptionRecord};
use crate::ports::{InsertOutcome, SubscriptionStore};

use super::lock_poisoned;

/// Records keyed by user id.
#[derive(Default, Clone)]
pub struct InMemorySubscriptionStore {
    records: Arc<Mutex<HashMap<UserId, SubscriptionRecord>>>,
    fail_with: Arc<Mutex<Option<DomainError>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing uniqueness checks.
    pub fn seed(&self, record: SubscriptionRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record.user_id.clone(), record);
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent call fail until [`heal`](Self::heal) is called.
    pub fn fail_all(&self, message: &str) {
        if let Ok(mut fail_with) = self.fail_with.lock() {
            *fail_with = Some(DomainError::new(ErrorCode::DatabaseError, message));
        }
    }

    pub fn heal(&self) {
        if let Ok(mut fail_with) = self.fail_with.lock() {
            *fail_with = None;
        }
    }

    fn check_failure(&self) -> Result<(), DomainError> {
        match self
            .fail_with
            .lock()
            .map_err(|_| lock_poisoned("subscription store"))?
            .as_ref()
        {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_failure()?;
        let records = self
            .records
            .lock()
            .map_err(|_| lock_poisoned("subscription store"))?;
        Ok(records.get(user_id).cloned())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_failure()?;
        let records = self
            .records
            .lock()
            .map_err(|_| lock_poisoned("subscription store"))?;
        Ok(records
            .values()
            .find(|r| r.customer_id == customer_id)
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        record: &SubscriptionRecord,
    ) -> Result<InsertOutcome, DomainError> {
        self.check_failure()?;
        let mut records = self
            .records
            .lock()
            .map_err(|_| lock_poisoned("subscription store"))?;

        if let Some(existing) = records.get(&record.user_id) {
            return Ok(InsertOutcome::AlreadyExists(existing.clone()));
        }
        if records.values().any(|r| r.customer_id == record.customer_id) {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                format!("Customer {} already belongs to another user", record.customer_id),
            ));
        }

        records.insert(record.user_id.clone(), record.clone());
        Ok(InsertOutcome::Inserted(record.clone()))
    }

    async fn upsert(
        &self,
        user_id: &UserId,
        patch: &SubscriptionPatch,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_failure()?;
        let mut records = self
            .records
            .lock()
            .map_err(|_| lock_poisoned("subscription store"))?;

        Ok(records.get_mut(user_id).map(|record| {
            record.apply(patch, Timestamp::now());
            record.clone()
        }))
    }

    async fn update_by_customer_id(
        &self,
        customer_id: &str,
        patch: &SubscriptionPatch,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        self.check_failure()?;
        let mut records = self
            .records
            .lock()
            .map_err(|_| lock_poisoned("subscription store"))?;

        Ok(records
            .values_mut()
            .find(|r| r.customer_id == customer_id)
            .map(|record| {
                record.apply(patch, Timestamp::now());
                record.clone()
            }))
    }
}
