//! WebhookEventRepository port - ledger of processed Stripe webhook events.
//!
//! Stripe delivers webhooks at least once: a timeout or a 5xx from our
//! endpoint triggers redelivery, and Stripe may also resend events that were
//! answered successfully. The ledger lets ingress skip events whose outcome
//! is already final and keeps payloads for auditing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// Final outcome of processing an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The subscription record was reconciled.
    Success,
    /// The event was acknowledged without touching any record.
    Ignored,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Success => "success",
            WebhookOutcome::Ignored => "ignored",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(WebhookOutcome::Success),
            "ignored" => Some(WebhookOutcome::Ignored),
            _ => None,
        }
    }
}

/// Record of a processed webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    /// Stripe event ID (evt_xxx format).
    pub event_id: String,

    /// Stripe event type (e.g., "invoice.payment_succeeded").
    pub event_type: String,

    pub processed_at: DateTime<Utc>,

    pub outcome: WebhookOutcome,

    /// Why the event was ignored, when it was.
    pub note: Option<String>,

    /// Original event payload.
    pub payload: serde_json::Value,
}

impl WebhookEventRecord {
    pub fn success(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            outcome: WebhookOutcome::Success,
            note: None,
            payload,
        }
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            outcome: WebhookOutcome::Ignored,
            note: Some(reason.into()),
            payload,
        }
    }
}

/// Result of attempting to save a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (another delivery finished first).
    AlreadyExists,
}

/// Port for storing and retrieving processed webhook events.
///
/// Implementations use a primary key on `event_id` so concurrent deliveries
/// of the same event cannot both insert.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Find a previously processed event by its Stripe event ID.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Save a record with `ON CONFLICT DO NOTHING` semantics.
    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_event_repository_is_object_safe() {
        fn _accepts_dyn(_repo: &dyn WebhookEventRepository) {}
    }

    #[test]
    fn success_record_has_no_note() {
        let record = WebhookEventRecord::success(
            "evt_1",
            "invoice.payment_succeeded",
            serde_json::json!({"id": "evt_1"}),
        );
        assert_eq!(record.outcome, WebhookOutcome::Success);
        assert!(record.note.is_none());
    }

    #[test]
    fn ignored_record_keeps_reason() {
        let record = WebhookEventRecord::ignored(
            "evt_2",
            "customer.created",
            "unhandled event type",
            serde_json::Value::Null,
        );
        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert_eq!(record.note.as_deref(), Some("unhandled event type"));
    }

    #[test]
    fn outcome_parses_its_own_spelling() {
        for outcome in [WebhookOutcome::Success, WebhookOutcome::Ignored] {
            assert_eq!(WebhookOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(WebhookOutcome::parse("failed"), None);
    }
}
