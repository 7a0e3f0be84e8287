//! Provider events as seen by the reconciler.

use serde::{Deserialize, Serialize};

use super::record::SubscriptionPatch;

/// Kinds of provider events that move a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderEventKind {
    CheckoutCompleted,
    InvoicePaid,
    SubscriptionUpdated,
}

/// A verified provider event paired with the subscription it refers to.
///
/// `patch` is built from the subscription as re-fetched from the provider,
/// never from the event's embedded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub event_id: String,
    pub kind: ProviderEventKind,
    pub customer_id: String,
    pub patch: SubscriptionPatch,
}
