//! HandleBillingWebhookHandler - Command handler for Stripe webhook
//! deliveries.
//!
//! Flow:
//! 1. Verify the signature
//! 2. Skip events the ledger already holds
//! 3. Map the event type to a reconciler event, or acknowledge and ignore it
//! 4. Re-fetch the referenced subscription from Stripe
//! 5. Apply it to the mirrored record and record the outcome
//!
//! Failures in steps 4 and 5 are returned without a ledger entry, so the
//! retried delivery gets a full second attempt.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{ProviderEvent, SubscriptionError, SubscriptionStatus};
use crate::ports::{
    BillingProvider, SubscriptionStore, WebhookEvent, WebhookEventRecord, WebhookEventRepository,
};

use super::apply_provider_event::ApplyProviderEventHandler;
use super::provider_call::{call_provider, DEFAULT_PROVIDER_TIMEOUT};

/// Raw webhook delivery.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    pub payload: Vec<u8>,
    /// Value of the `Stripe-Signature` header.
    pub signature: String,
}

/// How a delivery was acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAck {
    /// The subscription record was reconciled.
    Processed {
        event_id: String,
        user_id: UserId,
        status: SubscriptionStatus,
    },
    /// Nothing to reconcile; recorded as ignored.
    Ignored { event_id: String, reason: String },
    /// Already handled by an earlier delivery.
    Duplicate { event_id: String },
}

impl WebhookAck {
    pub fn event_id(&self) -> &str {
        match self {
            WebhookAck::Processed { event_id, .. }
            | WebhookAck::Ignored { event_id, .. }
            | WebhookAck::Duplicate { event_id } => event_id,
        }
    }
}

/// Handler for webhook deliveries.
pub struct HandleBillingWebhookHandler {
    provider: Arc<dyn BillingProvider>,
    ledger: Arc<dyn WebhookEventRepository>,
    apply: ApplyProviderEventHandler,
    provider_timeout: Duration,
}

impl HandleBillingWebhookHandler {
    pub fn new(
        provider: Arc<dyn BillingProvider>,
        store: Arc<dyn SubscriptionStore>,
        ledger: Arc<dyn WebhookEventRepository>,
    ) -> Self {
        Self {
            provider,
            ledger,
            apply: ApplyProviderEventHandler::new(store),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<WebhookAck, SubscriptionError> {
        // 1. Verify signature
        let event = self
            .provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "Rejected webhook delivery");
                SubscriptionError::from(err)
            })?;

        // 2. Dedupe
        if self.ledger.find_by_event_id(&event.id).await?.is_some() {
            tracing::debug!(event_id = %event.id, "Webhook event already processed");
            return Ok(WebhookAck::Duplicate { event_id: event.id });
        }

        // 3. Dispatch
        let Some(kind) = event.event_type.provider_event_kind() else {
            return self.ignore(event, "unhandled event type").await;
        };
        let Some(subscription_id) = event.data.subscription_id().map(String::from) else {
            return self.ignore(event, "no subscription referenced").await;
        };

        // 4. Re-fetch
        let fetched = call_provider(
            self.provider_timeout,
            "retrieve_subscription",
            self.provider.retrieve_subscription(&subscription_id),
        )
        .await
        .map_err(|err| {
            tracing::error!(
                event_id = %event.id,
                subscription_id = %subscription_id,
                error = %err,
                "Could not re-fetch subscription for webhook"
            );
            err
        })?;
        let Some(subscription) = fetched else {
            return self.ignore(event, "subscription not found at provider").await;
        };

        // 5. Apply and record
        let applied = self
            .apply
            .handle(ProviderEvent {
                event_id: event.id.clone(),
                kind,
                customer_id: subscription.customer_id.clone(),
                patch: subscription.to_patch(),
            })
            .await?;
        if !applied.applied {
            return self.ignore(event, "subscription already replaced").await;
        }

        self.ledger
            .save(WebhookEventRecord::success(
                &event.id,
                event.event_type.as_str(),
                event.payload,
            ))
            .await?;

        Ok(WebhookAck::Processed {
            event_id: event.id,
            user_id: applied.record.user_id,
            status: applied.record.status,
        })
    }

    async fn ignore(
        &self,
        event: WebhookEvent,
        reason: &str,
    ) -> Result<WebhookAck, SubscriptionError> {
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type.as_str(),
            reason,
            "Ignoring webhook event"
        );

        self.ledger
            .save(WebhookEventRecord::ignored(
                &event.id,
                event.event_type.as_str(),
                reason,
                event.payload,
            ))
            .await?;

        Ok(WebhookAck::Ignored {
            event_id: event.id,
            reason: reason.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryWebhookEventRepository};
    use crate::adapters::stripe::MockBillingProvider;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::SubscriptionRecord;
    use crate::ports::{BillingError, ProviderSubscription, WebhookOutcome};
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    struct Fixture {
        provider: MockBillingProvider,
        store: InMemorySubscriptionStore,
        ledger: InMemoryWebhookEventRepository,
    }

    impl Fixture {
        fn new() -> Self {
            let store = InMemorySubscriptionStore::new();
            store.seed(SubscriptionRecord::new(user(), "cus_1", Timestamp::now()));
            let provider = MockBillingProvider::with_webhook_secret(SECRET);
            provider.add_subscription(ProviderSubscription {
                id: "sub_1".to_string(),
                customer_id: "cus_1".to_string(),
                status: SubscriptionStatus::Active,
                price_id: Some("price_monthly".to_string()),
                current_period_start: 1_900_000_000,
                current_period_end: 1_902_592_000,
                cancel_at_period_end: false,
                latest_invoice_id: Some("in_1".to_string()),
            });
            Self {
                provider,
                store,
                ledger: InMemoryWebhookEventRepository::new(),
            }
        }

        fn handler(&self) -> HandleBillingWebhookHandler {
            HandleBillingWebhookHandler::new(
                Arc::new(self.provider.clone()),
                Arc::new(self.store.clone()),
                Arc::new(self.ledger.clone()),
            )
        }

        fn signed(&self, payload: Vec<u8>) -> HandleBillingWebhookCommand {
            HandleBillingWebhookCommand {
                signature: self.provider.sign_payload(&payload),
                payload,
            }
        }

        async fn record(&self) -> SubscriptionRecord {
            self.store.get(&user()).await.unwrap().unwrap()
        }
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn invoice_paid(event_id: &str) -> Vec<u8> {
        MockBillingProvider::event_payload(
            event_id,
            "invoice.payment_succeeded",
            json!({
                "id": "in_1",
                "object": "invoice",
                "customer": "cus_1",
                "subscription": "sub_1",
                // Embedded object deliberately disagrees with the provider
                "status": "draft"
            }),
        )
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Processing
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invoice_paid_activates_record_from_refetched_subscription() {
        let fx = Fixture::new();

        let ack = fx.handler().handle(fx.signed(invoice_paid("evt_1"))).await.unwrap();

        assert_eq!(
            ack,
            WebhookAck::Processed {
                event_id: "evt_1".to_string(),
                user_id: user(),
                status: SubscriptionStatus::Active,
            }
        );
        let record = fx.record().await;
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(
            record.current_period_end,
            Timestamp::from_unix_secs(1_902_592_000)
        );
        assert!(fx.provider.was_called("retrieve_subscription"));

        let ledger = fx.ledger.records();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].outcome, WebhookOutcome::Success);
        assert_eq!(ledger[0].event_type, "invoice.payment_succeeded");
    }

    #[tokio::test]
    async fn subscription_updated_uses_object_id() {
        let fx = Fixture::new();
        fx.provider.update_subscription("sub_1", |s| {
            s.status = SubscriptionStatus::PastDue;
        });
        let payload = MockBillingProvider::event_payload(
            "evt_2",
            "customer.subscription.updated",
            json!({ "id": "sub_1", "object": "subscription", "customer": "cus_1", "status": "active" }),
        );

        fx.handler().handle(fx.signed(payload)).await.unwrap();

        assert_eq!(fx.record().await.status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn duplicate_delivery_skips_refetch() {
        let fx = Fixture::new();
        let handler = fx.handler();
        handler.handle(fx.signed(invoice_paid("evt_1"))).await.unwrap();
        let after_first = fx.record().await;
        fx.provider.clear_calls();

        let ack = handler.handle(fx.signed(invoice_paid("evt_1"))).await.unwrap();

        assert_eq!(ack, WebhookAck::Duplicate { event_id: "evt_1".to_string() });
        assert!(!fx.provider.was_called("retrieve_subscription"));
        assert_eq!(fx.record().await, after_first);
        assert_eq!(fx.ledger.len(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Ignored events
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_event_type_is_ignored_and_recorded() {
        let fx = Fixture::new();
        let payload = MockBillingProvider::event_payload(
            "evt_3",
            "customer.created",
            json!({ "id": "cus_1", "object": "customer" }),
        );

        let ack = fx.handler().handle(fx.signed(payload)).await.unwrap();

        assert!(matches!(ack, WebhookAck::Ignored { .. }));
        assert!(!fx.provider.was_called("retrieve_subscription"));
        let ledger = fx.ledger.records();
        assert_eq!(ledger[0].outcome, WebhookOutcome::Ignored);
        assert_eq!(ledger[0].note.as_deref(), Some("unhandled event type"));
    }

    #[tokio::test]
    async fn one_off_payment_is_ignored() {
        let fx = Fixture::new();
        let payload = MockBillingProvider::event_payload(
            "evt_4",
            "checkout.session.completed",
            json!({ "id": "cs_1", "object": "checkout.session", "customer": "cus_1", "subscription": null }),
        );

        let ack = fx.handler().handle(fx.signed(payload)).await.unwrap();

        assert_eq!(
            ack,
            WebhookAck::Ignored {
                event_id: "evt_4".to_string(),
                reason: "no subscription referenced".to_string(),
            }
        );
        assert_eq!(fx.record().await.status, SubscriptionStatus::None);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn bad_signature_is_rejected_without_writes() {
        let fx = Fixture::new();
        let cmd = HandleBillingWebhookCommand {
            payload: invoice_paid("evt_1"),
            signature: "t=1,v1=deadbeef".to_string(),
        };

        let err = fx.handler().handle(cmd).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::InvalidSignature(_)));
        assert!(!err.is_retryable());
        assert_eq!(fx.record().await.status, SubscriptionStatus::None);
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn refetch_failure_is_retryable_and_unrecorded() {
        let fx = Fixture::new();
        fx.provider
            .set_method_error("retrieve_subscription", BillingError::network("connection reset"));

        let err = fx
            .handler()
            .handle(fx.signed(invoice_paid("evt_1")))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(fx.ledger.is_empty());

        // Redelivery after recovery goes through
        fx.provider.clear_errors();
        let ack = fx.handler().handle(fx.signed(invoice_paid("evt_1"))).await.unwrap();
        assert!(matches!(ack, WebhookAck::Processed { .. }));
    }

    #[tokio::test]
    async fn event_before_local_record_is_retryable() {
        let fx = Fixture::new();
        fx.provider.update_subscription("sub_1", |s| {
            s.customer_id = "cus_unknown".to_string();
        });

        let err = fx
            .handler()
            .handle(fx.signed(invoice_paid("evt_1")))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::UnknownCustomer(_)));
        assert!(fx.ledger.is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_retryable() {
        let fx = Fixture::new();
        fx.store.fail_all("connection refused");

        let err = fx
            .handler()
            .handle(fx.signed(invoice_paid("evt_1")))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::Infrastructure(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn late_event_for_replaced_subscription_is_ignored() {
        let fx = Fixture::new();
        fx.handler()
            .handle(fx.signed(invoice_paid("evt_1")))
            .await
            .unwrap();
        fx.provider.add_subscription(ProviderSubscription {
            id: "sub_0".to_string(),
            customer_id: "cus_1".to_string(),
            status: SubscriptionStatus::Canceled,
            price_id: Some("price_monthly".to_string()),
            current_period_start: 1_800_000_000,
            current_period_end: 1_802_592_000,
            cancel_at_period_end: false,
            latest_invoice_id: None,
        });
        let payload = MockBillingProvider::event_payload(
            "evt_old",
            "customer.subscription.updated",
            json!({ "id": "sub_0", "object": "subscription", "customer": "cus_1" }),
        );

        let ack = fx.handler().handle(fx.signed(payload)).await.unwrap();

        assert!(matches!(ack, WebhookAck::Ignored { .. }));
        let record = fx.record().await;
        assert_eq!(record.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(record.status, SubscriptionStatus::Active);
        let ignored = fx
            .ledger
            .records()
            .into_iter()
            .find(|r| r.event_id == "evt_old")
            .unwrap();
        assert_eq!(ignored.outcome, WebhookOutcome::Ignored);
    }
}
