//! Mirrored subscription status.
//!
//! The status is a copy of the billing provider's own status string. There
//! is no local transition table: whatever the provider reports is what gets
//! stored, so the record can never hold a state the provider does not know.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription status as reported by Stripe.
///
/// `None` is the local placeholder for a customer that has never started a
/// subscription. Statuses Stripe may add later are preserved verbatim in
/// `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubscriptionStatus {
    /// Customer exists, no subscription has been created yet.
    #[default]
    None,

    /// First payment has not completed yet.
    Incomplete,

    /// First payment was never completed and the attempt expired.
    IncompleteExpired,

    Trialing,

    /// Paid and current.
    Active,

    /// Renewal payment failed and is being retried.
    PastDue,

    Canceled,

    Unpaid,

    Paused,

    /// A status string this build does not know about.
    Other(String),
}

impl SubscriptionStatus {
    /// Parses a provider status string. Unknown values are kept, not rejected.
    pub fn from_provider(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the provider's spelling of this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
            Self::Other(value) => value,
        }
    }

    /// Only `active` grants premium access.
    pub fn grants_entitlement(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// True while the first payment of a subscription is still outstanding.
    pub fn is_awaiting_payment(&self) -> bool {
        matches!(self, Self::Incomplete)
    }

    /// Stripe never moves a subscription out of these states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::IncompleteExpired)
    }
}

impl From<String> for SubscriptionStatus {
    fn from(value: String) -> Self {
        Self::from_provider(&value)
    }
}

impl From<SubscriptionStatus> for String {
    fn from(status: SubscriptionStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
