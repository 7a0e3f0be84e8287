//! The locally mirrored subscription record.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::entitlement::is_entitled;
use super::status::SubscriptionStatus;

/// One billing relationship per user, mirrored from the provider.
///
/// `customer_id` is assigned once at creation and never changes. Every other
/// billing field is overwritten wholesale by [`SubscriptionRecord::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub price_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionRecord {
    /// Creates the record for a freshly created provider customer.
    pub fn new(user_id: UserId, customer_id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            user_id,
            customer_id: customer_id.into(),
            subscription_id: None,
            price_id: None,
            status: SubscriptionStatus::None,
            current_period_start: None,
            current_period_end: None,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the mirrored fields with the provider's values.
    ///
    /// Returns `false` and leaves the record untouched (including
    /// `updated_at`) when the patch carries nothing new, so re-delivered
    /// events are exact no-ops.
    pub fn apply(&mut self, patch: &SubscriptionPatch, now: Timestamp) -> bool {
        if patch.matches(self) {
            return false;
        }

        self.subscription_id = Some(patch.subscription_id.clone());
        self.price_id = patch.price_id.clone();
        self.status = patch.status.clone();
        self.current_period_start = patch.current_period_start;
        self.current_period_end = patch.current_period_end;
        self.cancel_at_period_end = patch.cancel_at_period_end;
        self.updated_at = now;
        true
    }

    /// Subscription id Stripe may still bill, if there is one.
    pub fn open_subscription_id(&self) -> Option<&str> {
        if self.status == SubscriptionStatus::None || self.status.is_terminal() {
            None
        } else {
            self.subscription_id.as_deref()
        }
    }

    pub fn is_entitled_at(&self, now: Timestamp) -> bool {
        is_entitled(Some(self), now)
    }

    /// Renewal line shown on the billing settings page.
    pub fn billing_summary(&self) -> Option<BillingSummary> {
        let period_end = self.current_period_end?;
        match self.status {
            SubscriptionStatus::Active | SubscriptionStatus::Trialing => {
                if self.cancel_at_period_end {
                    Some(BillingSummary::CancelsOn(period_end))
                } else {
                    Some(BillingSummary::RenewsOn(period_end))
                }
            }
            _ => None,
        }
    }
}

/// Billing fields copied verbatim from a provider subscription object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPatch {
    pub subscription_id: String,
    pub price_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
}

impl SubscriptionPatch {
    fn matches(&self, record: &SubscriptionRecord) -> bool {
        record.subscription_id.as_deref() == Some(self.subscription_id.as_str())
            && record.price_id == self.price_id
            && record.status == self.status
            && record.current_period_start == self.current_period_start
            && record.current_period_end == self.current_period_end
            && record.cancel_at_period_end == self.cancel_at_period_end
    }

    /// True for the final state of a subscription the record has already
    /// replaced with a newer one.
    pub fn ends_replaced_subscription(&self, record: &SubscriptionRecord) -> bool {
        self.status.is_terminal()
            && record
                .subscription_id
                .as_deref()
                .is_some_and(|current| current != self.subscription_id)
    }
}

/// Whether the current period ends in a renewal or a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "on", rename_all = "snake_case")]
pub enum BillingSummary {
    RenewsOn(Timestamp),
    CancelsOn(Timestamp),
}
