//! Mock billing provider for testing.
//!
//! A stateful stand-in for Stripe implementing `BillingProvider`. It keeps
//! customers, subscriptions, invoices and payment intents in memory so the
//! reconciler can be exercised end to end. Supports:
//! - Idempotency keys (replays return the original object)
//! - Error injection, per method or once
//! - Artificial latency, to trip caller timeouts
//! - Call tracking
//! - Webhook verification, either permissive or with a real signing secret

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::domain::subscription::SubscriptionStatus;
use crate::ports::{
    BillingError, BillingErrorCode, BillingProvider, CreateCustomerRequest,
    CreateSubscriptionRequest, CreatedSubscription, Customer, Invoice, PaymentIntent,
    PortalSession, Price, ProviderSubscription, WebhookEvent,
};

use super::webhook_verifier::WebhookVerifier;

const PERIOD_SECS: i64 = 30 * 24 * 60 * 60;

/// Mock billing provider for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockBillingProvider::new();
///
/// // Inject errors
/// mock.set_method_error("create_subscription", BillingError::timeout("slow"));
///
/// // Drive provider-side state, then deliver a webhook
/// mock.pay_latest_invoice("sub_mock_1");
/// ```
#[derive(Default, Clone)]
pub struct MockBillingProvider {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

/// Internal mutable state.
#[derive(Default)]
struct MockState {
    customers: HashMap<String, Customer>,
    subscriptions: HashMap<String, ProviderSubscription>,
    invoices: HashMap<String, Invoice>,
    payment_intents: HashMap<String, PaymentIntent>,
    prices: Vec<Price>,

    /// Idempotency key to the id of the object it created.
    idempotent_customers: HashMap<String, String>,
    idempotent_subscriptions: HashMap<String, String>,

    /// Error to return on next call.
    next_error: Option<BillingError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, BillingError>,

    /// Delay applied before a method answers.
    method_latency: HashMap<String, Duration>,

    /// Leave the payment intent without a client secret.
    omit_client_secret: bool,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    webhook_mode: WebhookVerifyMode,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// How to handle webhook verification.
#[derive(Default, Clone)]
enum WebhookVerifyMode {
    /// Parse any payload without checking the signature.
    #[default]
    AcceptAll,

    /// Check signatures with a real secret.
    Signed(WebhookVerifier),

    /// Always fail verification.
    AlwaysFail,
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

impl MockBillingProvider {
    /// Create a new mock provider with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that verifies webhook signatures with `secret`.
    pub fn with_webhook_secret(secret: &str) -> Self {
        let mock = Self::new();
        mock.state().webhook_mode =
            WebhookVerifyMode::Signed(WebhookVerifier::new(SecretString::new(secret.to_string())));
        mock
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().webhook_mode = WebhookVerifyMode::AlwaysFail;
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Provider-side State
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a customer to the "database".
    pub fn add_customer(&self, customer: Customer) {
        let id = customer.id.clone();
        self.state().customers.insert(id, customer);
    }

    /// Add a subscription to the "database".
    pub fn add_subscription(&self, subscription: ProviderSubscription) {
        let id = subscription.id.clone();
        self.state().subscriptions.insert(id, subscription);
    }

    /// Add a price to the catalog.
    pub fn add_price(&self, price: Price) {
        self.state().prices.push(price);
    }

    /// Current provider-side view of a subscription.
    pub fn subscription(&self, subscription_id: &str) -> Option<ProviderSubscription> {
        self.state().subscriptions.get(subscription_id).cloned()
    }

    /// Number of subscriptions the provider holds.
    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    /// Number of customers the provider holds.
    pub fn customer_count(&self) -> usize {
        self.state().customers.len()
    }

    /// Apply an arbitrary change to a stored subscription.
    pub fn update_subscription(
        &self,
        subscription_id: &str,
        change: impl FnOnce(&mut ProviderSubscription),
    ) -> bool {
        match self.state().subscriptions.get_mut(subscription_id) {
            Some(subscription) => {
                change(subscription);
                true
            }
            None => false,
        }
    }

    /// Mark the subscription's latest invoice as paid, as Stripe does when the
    /// customer confirms the first payment.
    pub fn pay_latest_invoice(&self, subscription_id: &str) -> bool {
        let mut state = self.state();
        let Some(subscription) = state.subscriptions.get_mut(subscription_id) else {
            return false;
        };
        subscription.status = SubscriptionStatus::Active;
        let invoice_id = subscription.latest_invoice_id.clone();

        let intent_id = invoice_id.and_then(|id| {
            let invoice = state.invoices.get_mut(&id)?;
            invoice.status = Some("paid".to_string());
            invoice.payment_intent_id.clone()
        });
        if let Some(intent) = intent_id.and_then(|id| state.payment_intents.get_mut(&id)) {
            intent.status = "succeeded".to_string();
        }
        true
    }

    /// Create subscriptions whose payment intents carry no client secret.
    pub fn omit_client_secret(&self, omit: bool) {
        self.state().omit_client_secret = omit;
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fault Injection
    // ════════════════════════════════════════════════════════════════════════════

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: BillingError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: BillingError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Delay a specific method's answer.
    pub fn set_latency(&self, method: &str, delay: Duration) {
        self.state()
            .method_latency
            .insert(method.to_string(), delay);
    }

    /// Clear all configured errors and delays.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
        state.method_latency.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Webhooks
    // ════════════════════════════════════════════════════════════════════════════

    /// Signature header for `payload`, valid when the mock was built with
    /// [`with_webhook_secret`](Self::with_webhook_secret).
    pub fn sign_payload(&self, payload: &[u8]) -> String {
        let timestamp = chrono::Utc::now().timestamp();
        match &self.state().webhook_mode {
            WebhookVerifyMode::Signed(verifier) => verifier.signature_header_for(payload, timestamp),
            _ => format!("t={},v1={}", timestamp, "00".repeat(32)),
        }
    }

    /// Serialize a Stripe-shaped event envelope.
    pub fn event_payload(event_id: &str, event_type: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::json!({
            "id": event_id,
            "object": "event",
            "type": event_type,
            "created": chrono::Utc::now().timestamp(),
            "data": { "object": object },
            "livemode": false,
            "api_version": super::stripe_types::STRIPE_API_VERSION
        })
        .to_string()
        .into_bytes()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    /// Record the call, wait out any configured latency, then surface any
    /// injected error.
    async fn enter(&self, method: &str, args: Vec<String>) -> Result<(), BillingError> {
        let delay = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: method.to_string(),
                args,
            });
            state.method_latency.get(method).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();

        // Method-specific errors persist until cleared
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }

        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, BillingError> {
        self.enter(
            "create_customer",
            vec![request.user_id.to_string(), request.email.clone()],
        )
        .await?;

        let mut state = self.state();

        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = state
                .idempotent_customers
                .get(key)
                .and_then(|id| state.customers.get(id))
            {
                return Ok(existing.clone());
            }
        }

        let customer = Customer {
            id: format!("cus_mock_{}", short_id()),
            email: Some(request.email),
            name: Some(request.name),
            created_at: chrono::Utc::now().timestamp(),
        };
        state
            .customers
            .insert(customer.id.clone(), customer.clone());
        if let Some(key) = request.idempotency_key {
            state.idempotent_customers.insert(key, customer.id.clone());
        }

        Ok(customer)
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, BillingError> {
        self.enter(
            "create_subscription",
            vec![request.customer_id.clone(), request.price_id.clone()],
        )
        .await?;

        let mut state = self.state();

        if let Some(key) = &request.idempotency_key {
            if let Some(existing) = state
                .idempotent_subscriptions
                .get(key)
                .and_then(|id| state.subscriptions.get(id))
            {
                let client_secret = existing
                    .latest_invoice_id
                    .as_ref()
                    .and_then(|id| state.invoices.get(id))
                    .and_then(|invoice| invoice.payment_intent_id.as_ref())
                    .and_then(|id| state.payment_intents.get(id))
                    .and_then(|intent| intent.client_secret.clone());
                return Ok(CreatedSubscription {
                    subscription: existing.clone(),
                    client_secret,
                });
            }
        }

        if !state.customers.contains_key(&request.customer_id) {
            return Err(BillingError::new(
                BillingErrorCode::NotFound,
                format!("No such customer: '{}'", request.customer_id),
            )
            .with_provider_code("resource_missing"));
        }

        let now = chrono::Utc::now().timestamp();
        let suffix = short_id();
        let subscription_id = format!("sub_mock_{}", suffix);
        let invoice_id = format!("in_mock_{}", suffix);
        let intent_id = format!("pi_mock_{}", suffix);
        let client_secret =
            (!state.omit_client_secret).then(|| format!("{}_secret_{}", intent_id, short_id()));

        state.payment_intents.insert(
            intent_id.clone(),
            PaymentIntent {
                id: intent_id.clone(),
                status: "requires_payment_method".to_string(),
                client_secret: client_secret.clone(),
            },
        );
        state.invoices.insert(
            invoice_id.clone(),
            Invoice {
                id: invoice_id.clone(),
                customer_id: request.customer_id.clone(),
                subscription_id: Some(subscription_id.clone()),
                status: Some("open".to_string()),
                payment_intent_id: Some(intent_id),
            },
        );

        let subscription = ProviderSubscription {
            id: subscription_id.clone(),
            customer_id: request.customer_id,
            status: SubscriptionStatus::Incomplete,
            price_id: Some(request.price_id),
            current_period_start: now,
            current_period_end: now + PERIOD_SECS,
            cancel_at_period_end: false,
            latest_invoice_id: Some(invoice_id),
        };
        state
            .subscriptions
            .insert(subscription_id.clone(), subscription.clone());
        if let Some(key) = request.idempotency_key {
            state.idempotent_subscriptions.insert(key, subscription_id);
        }

        Ok(CreatedSubscription {
            subscription,
            client_secret,
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, BillingError> {
        self.enter("retrieve_subscription", vec![subscription_id.to_string()])
            .await?;
        Ok(self.state().subscriptions.get(subscription_id).cloned())
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingError> {
        self.enter("retrieve_invoice", vec![invoice_id.to_string()])
            .await?;
        Ok(self.state().invoices.get(invoice_id).cloned())
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, BillingError> {
        self.enter(
            "retrieve_payment_intent",
            vec![payment_intent_id.to_string()],
        )
        .await?;
        Ok(self.state().payment_intents.get(payment_intent_id).cloned())
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: &SubscriptionStatus,
    ) -> Result<Vec<ProviderSubscription>, BillingError> {
        self.enter(
            "list_subscriptions",
            vec![customer_id.to_string(), status.to_string()],
        )
        .await?;

        let mut subscriptions: Vec<_> = self
            .state()
            .subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id && &s.status == status)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(subscriptions)
    }

    async fn list_prices(&self, lookup_keys: &[String]) -> Result<Vec<Price>, BillingError> {
        self.enter("list_prices", lookup_keys.to_vec()).await?;

        Ok(self
            .state()
            .prices
            .iter()
            .filter(|p| {
                lookup_keys.is_empty()
                    || p.lookup_key
                        .as_ref()
                        .map_or(false, |key| lookup_keys.contains(key))
            })
            .cloned()
            .collect())
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, BillingError> {
        self.enter(
            "create_billing_portal_session",
            vec![customer_id.to_string(), return_url.to_string()],
        )
        .await?;

        if !self.state().customers.contains_key(customer_id) {
            return Err(BillingError::not_found("Customer"));
        }

        let id = format!("bps_mock_{}", short_id());
        Ok(PortalSession {
            url: format!("https://billing.stripe.com/p/session/{}", id),
            id,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        self.enter("verify_webhook", vec![signature.to_string()])
            .await?;

        let mode = self.state().webhook_mode.clone();
        match mode {
            WebhookVerifyMode::AcceptAll => {
                WebhookVerifier::new(SecretString::new(String::new())).parse_event(payload)
            }
            WebhookVerifyMode::Signed(verifier) => verifier.verify(payload, signature),
            WebhookVerifyMode::AlwaysFail => {
                Err(BillingError::invalid_webhook("Invalid signature"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn customer_request(key: Option<&str>) -> CreateCustomerRequest {
        CreateCustomerRequest {
            user_id: UserId::new("test-user-123").unwrap(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            idempotency_key: key.map(String::from),
        }
    }

    async fn customer(mock: &MockBillingProvider) -> Customer {
        mock.create_customer(customer_request(None)).await.unwrap()
    }

    fn subscription_request(customer_id: &str, key: Option<&str>) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            customer_id: customer_id.to_string(),
            price_id: "price_123".to_string(),
            idempotency_key: key.map(String::from),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Customers and Subscriptions
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_customer_replays_idempotency_key() {
        let mock = MockBillingProvider::new();

        let first = mock.create_customer(customer_request(Some("k"))).await.unwrap();
        let second = mock.create_customer(customer_request(Some("k"))).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(mock.customer_count(), 1);
        assert_eq!(mock.call_count("create_customer"), 2);
    }

    #[tokio::test]
    async fn create_subscription_is_incomplete_with_secret() {
        let mock = MockBillingProvider::new();
        let customer = customer(&mock).await;

        let created = mock
            .create_subscription(subscription_request(&customer.id, None))
            .await
            .unwrap();

        assert_eq!(created.subscription.status, SubscriptionStatus::Incomplete);
        assert!(created.client_secret.unwrap().contains("_secret_"));

        let invoice_id = created.subscription.latest_invoice_id.unwrap();
        let invoice = mock.retrieve_invoice(&invoice_id).await.unwrap().unwrap();
        let intent = mock
            .retrieve_payment_intent(&invoice.payment_intent_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(intent.client_secret.is_some());
    }

    #[tokio::test]
    async fn create_subscription_replays_idempotency_key() {
        let mock = MockBillingProvider::new();
        let customer = customer(&mock).await;

        let first = mock
            .create_subscription(subscription_request(&customer.id, Some("k")))
            .await
            .unwrap();
        let second = mock
            .create_subscription(subscription_request(&customer.id, Some("k")))
            .await
            .unwrap();

        assert_eq!(first.subscription.id, second.subscription.id);
        assert_eq!(first.client_secret, second.client_secret);
        assert_eq!(mock.subscription_count(), 1);
    }

    #[tokio::test]
    async fn create_subscription_for_unknown_customer_fails() {
        let mock = MockBillingProvider::new();
        let err = mock
            .create_subscription(subscription_request("cus_missing", None))
            .await
            .unwrap_err();
        assert_eq!(err.code, BillingErrorCode::NotFound);
    }

    #[tokio::test]
    async fn omitted_client_secret() {
        let mock = MockBillingProvider::new();
        mock.omit_client_secret(true);
        let customer = customer(&mock).await;

        let created = mock
            .create_subscription(subscription_request(&customer.id, None))
            .await
            .unwrap();
        assert!(created.client_secret.is_none());
    }

    #[tokio::test]
    async fn pay_latest_invoice_activates_subscription() {
        let mock = MockBillingProvider::new();
        let customer = customer(&mock).await;
        let created = mock
            .create_subscription(subscription_request(&customer.id, None))
            .await
            .unwrap();

        assert!(mock.pay_latest_invoice(&created.subscription.id));

        let active = mock
            .list_subscriptions(&customer.id, &SubscriptionStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert!(!mock.pay_latest_invoice("sub_missing"));
    }

    #[tokio::test]
    async fn list_prices_filters_by_lookup_key() {
        let mock = MockBillingProvider::new();
        for (id, key) in [("price_m", "monthly"), ("price_y", "yearly")] {
            mock.add_price(Price {
                id: id.to_string(),
                lookup_key: Some(key.to_string()),
                unit_amount: Some(980),
                currency: "jpy".to_string(),
                interval: Some("month".to_string()),
                product_name: Some("Premium".to_string()),
            });
        }

        let prices = mock.list_prices(&["monthly".to_string()]).await.unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].id, "price_m");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fault Injection
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn method_error_persists_until_cleared() {
        let mock = MockBillingProvider::new();
        mock.set_method_error("retrieve_subscription", BillingError::network("reset"));

        assert!(mock.retrieve_subscription("sub_1").await.is_err());
        assert!(mock.retrieve_subscription("sub_1").await.is_err());

        mock.clear_errors();
        assert!(mock.retrieve_subscription("sub_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn next_error_is_consumed() {
        let mock = MockBillingProvider::new();
        mock.set_error(BillingError::timeout("slow"));

        assert!(mock.retrieve_invoice("in_1").await.is_err());
        assert!(mock.retrieve_invoice("in_1").await.is_ok());
    }

    #[tokio::test]
    async fn latency_delays_answer() {
        let mock = MockBillingProvider::new();
        mock.set_latency("list_prices", Duration::from_millis(200));

        let result =
            tokio::time::timeout(Duration::from_millis(20), mock.list_prices(&[])).await;
        assert!(result.is_err());
        assert!(mock.was_called("list_prices"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Webhooks
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn signed_mode_checks_signature() {
        let mock = MockBillingProvider::with_webhook_secret("whsec_test");
        let payload = MockBillingProvider::event_payload(
            "evt_1",
            "customer.subscription.updated",
            serde_json::json!({"id": "sub_1", "customer": "cus_1"}),
        );

        let signature = mock.sign_payload(&payload);
        let event = mock.verify_webhook(&payload, &signature).await.unwrap();
        assert_eq!(event.id, "evt_1");

        let forged = format!("t={},v1={}", chrono::Utc::now().timestamp(), "ab".repeat(32));
        assert!(mock.verify_webhook(&payload, &forged).await.is_err());
    }

    #[tokio::test]
    async fn accept_all_mode_ignores_signature() {
        let mock = MockBillingProvider::new();
        let payload = MockBillingProvider::event_payload(
            "evt_2",
            "invoice.paid",
            serde_json::json!({"id": "in_1", "customer": "cus_1", "subscription": "sub_1"}),
        );

        let event = mock.verify_webhook(&payload, "anything").await.unwrap();
        assert_eq!(event.data.subscription_id(), Some("sub_1"));
    }

    #[tokio::test]
    async fn rejecting_mode_fails_everything() {
        let mock = MockBillingProvider::rejecting_webhooks();
        let payload = MockBillingProvider::event_payload("evt_3", "invoice.paid", serde_json::json!({}));

        let err = mock.verify_webhook(&payload, "t=1,v1=00").await.unwrap_err();
        assert_eq!(err.code, BillingErrorCode::InvalidWebhook);
    }
}
