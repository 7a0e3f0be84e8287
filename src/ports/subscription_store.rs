//! SubscriptionStore port - persistence for mirrored subscription records.
//!
//! The store, not the reconciler, owns row-level atomicity: every write is a
//! single-row statement keyed by `user_id` or `customer_id`, and `user_id`
//! carries a uniqueness constraint so concurrent first-time checkouts collapse
//! to one record.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::subscription::{SubscriptionPatch, SubscriptionRecord};

/// Result of attempting to create a user's record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// This call created the record.
    Inserted(SubscriptionRecord),
    /// Another writer got there first; this is its record.
    AlreadyExists(SubscriptionRecord),
}

impl InsertOutcome {
    pub fn into_record(self) -> SubscriptionRecord {
        match self {
            InsertOutcome::Inserted(record) | InsertOutcome::AlreadyExists(record) => record,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// Port for reading and writing subscription records.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Load the record owned by a user.
    async fn get(&self, user_id: &UserId) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Load the record for a provider customer.
    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Create the record unless the user already has one.
    ///
    /// Must be race-free: of two concurrent calls for the same user exactly
    /// one returns `Inserted`, the other receives the stored record.
    async fn insert_if_absent(
        &self,
        record: &SubscriptionRecord,
    ) -> Result<InsertOutcome, DomainError>;

    /// Overwrite the mirrored fields of the user's record.
    ///
    /// Returns `None` if the user has no record.
    async fn upsert(
        &self,
        user_id: &UserId,
        patch: &SubscriptionPatch,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Overwrite the mirrored fields of the record owned by a customer.
    ///
    /// Returns `None` if no record belongs to the customer.
    async fn update_by_customer_id(
        &self,
        customer_id: &str,
        patch: &SubscriptionPatch,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    #[test]
    fn subscription_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SubscriptionStore) {}
    }

    #[test]
    fn insert_outcome_yields_record_either_way() {
        let record = SubscriptionRecord::new(UserId::new("u").unwrap(), "cus_1", Timestamp::now());

        let inserted = InsertOutcome::Inserted(record.clone());
        assert!(inserted.was_inserted());
        assert_eq!(inserted.into_record(), record);

        let existing = InsertOutcome::AlreadyExists(record.clone());
        assert!(!existing.was_inserted());
        assert_eq!(existing.into_record(), record);
    }
}
