//! Subscription error taxonomy.
//!
//! | Error | Retryable | Raised by |
//! |-------|-----------|-----------|
//! | NotFound | no | checkout when the user, name or email is missing |
//! | UnknownCustomer | yes | event application before the record is visible |
//! | NoSubscription | no | portal and subscription info without a record |
//! | SecretUnavailable | no | checkout when Stripe returns no client secret |
//! | AlreadySubscribed | no | checkout while a paid subscription is still live |
//! | InvalidSignature | no | webhook ingress |
//! | ProviderUnavailable | yes | network failure or timeout talking to Stripe |
//! | Provider | no | Stripe rejected the request |
//! | Infrastructure | yes | store failures |

use thiserror::Error;

use crate::domain::foundation::{DomainError, UserId};

/// Failures of the subscription lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No subscription record for customer {0}")]
    UnknownCustomer(String),

    #[error("User {0} has no billing relationship")]
    NoSubscription(UserId),

    #[error("No usable payment secret for subscription {subscription_id}")]
    SecretUnavailable { subscription_id: String },

    #[error("Subscription {subscription_id} is already live")]
    AlreadySubscribed { subscription_id: String },

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Billing provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Billing provider error: {0}")]
    Provider(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl SubscriptionError {
    pub fn not_found(what: impl Into<String>) -> Self {
        SubscriptionError::NotFound(what.into())
    }

    pub fn secret_unavailable(subscription_id: impl Into<String>) -> Self {
        SubscriptionError::SecretUnavailable {
            subscription_id: subscription_id.into(),
        }
    }

    pub fn already_subscribed(subscription_id: impl Into<String>) -> Self {
        SubscriptionError::AlreadySubscribed {
            subscription_id: subscription_id.into(),
        }
    }

    pub fn provider_unavailable(reason: impl Into<String>) -> Self {
        SubscriptionError::ProviderUnavailable(reason.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            SubscriptionError::NotFound(_) => "NOT_FOUND",
            SubscriptionError::UnknownCustomer(_) => "UNKNOWN_CUSTOMER",
            SubscriptionError::NoSubscription(_) => "NO_SUBSCRIPTION",
            SubscriptionError::SecretUnavailable { .. } => "SECRET_UNAVAILABLE",
            SubscriptionError::AlreadySubscribed { .. } => "ALREADY_SUBSCRIBED",
            SubscriptionError::InvalidSignature(_) => "INVALID_SIGNATURE",
            SubscriptionError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            SubscriptionError::Provider(_) => "PROVIDER_ERROR",
            SubscriptionError::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the same request may succeed if repeated later.
    ///
    /// Webhook ingress answers retryable failures with a 5xx so Stripe
    /// redelivers the event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionError::UnknownCustomer(_)
                | SubscriptionError::ProviderUnavailable(_)
                | SubscriptionError::Infrastructure(_)
        )
    }
}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        SubscriptionError::Infrastructure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    #[test]
    fn codes_are_distinct() {
        let errors = [
            SubscriptionError::not_found("user"),
            SubscriptionError::UnknownCustomer("cus_1".into()),
            SubscriptionError::NoSubscription(UserId::new("u").unwrap()),
            SubscriptionError::secret_unavailable("sub_1"),
            SubscriptionError::already_subscribed("sub_1"),
            SubscriptionError::InvalidSignature("bad".into()),
            SubscriptionError::provider_unavailable("timeout"),
            SubscriptionError::Provider("card declined".into()),
            SubscriptionError::infrastructure("db down"),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(SubscriptionError::provider_unavailable("timeout").is_retryable());
        assert!(SubscriptionError::infrastructure("db").is_retryable());
        assert!(SubscriptionError::UnknownCustomer("cus_1".into()).is_retryable());

        assert!(!SubscriptionError::InvalidSignature("bad".into()).is_retryable());
        assert!(!SubscriptionError::secret_unavailable("sub_1").is_retryable());
        assert!(!SubscriptionError::not_found("user").is_retryable());
    }

    #[test]
    fn domain_error_becomes_infrastructure() {
        let err: SubscriptionError =
            DomainError::new(ErrorCode::DatabaseError, "connection refused").into();
        assert!(matches!(err, SubscriptionError::Infrastructure(msg) if msg.contains("connection refused")));
    }

    #[test]
    fn display_includes_subscription_id() {
        let err = SubscriptionError::secret_unavailable("sub_42");
        assert!(err.to_string().contains("sub_42"));
    }
}
