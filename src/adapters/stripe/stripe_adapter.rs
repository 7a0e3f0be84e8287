//! Stripe billing provider adapter.
//!
//! Implements the `BillingProvider` port against the Stripe REST API:
//! customers, incomplete-first subscriptions, invoice and payment intent
//! lookups, prices, billing portal sessions and webhook verification.
//!
//! # Security
//!
//! - Secrets handled via `secrecy::SecretString`
//! - Webhooks verified by [`WebhookVerifier`] before parsing
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::from_payment_config(&app_config.payment);
//! let adapter = StripeBillingAdapter::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::config::PaymentConfig;
use crate::domain::subscription::SubscriptionStatus;
use crate::ports::{
    BillingError, BillingErrorCode, BillingProvider, CreateCustomerRequest,
    CreateSubscriptionRequest, CreatedSubscription, Customer, Invoice, PaymentIntent,
    PortalSession, Price, ProviderSubscription, WebhookEvent,
};

use super::stripe_types::{
    StripeCustomer, StripeErrorBody, StripeInvoice, StripeList, StripePaymentIntent,
    StripePortalSession, StripePrice, StripeSubscription, STRIPE_API_VERSION,
};
use super::webhook_verifier::WebhookVerifier;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Whether to require livemode events in production.
    require_livemode: bool,

    /// Per-request timeout for API calls.
    request_timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            require_livemode: false,
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Build from the application's payment section.
    pub fn from_payment_config(payment: &PaymentConfig) -> Self {
        Self::new(
            payment.stripe_api_key.clone(),
            payment.stripe_webhook_secret.clone(),
        )
        .with_require_livemode(payment.require_livemode)
        .with_timeout(payment.provider_timeout())
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Require livemode events in production.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Stripe billing adapter.
pub struct StripeBillingAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
    verifier: WebhookVerifier,
}

impl StripeBillingAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Result<Self, BillingError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BillingError::network(format!("Failed to build HTTP client: {}", e)))?;

        let verifier = WebhookVerifier::new(config.webhook_secret.clone())
            .with_require_livemode(config.require_livemode);

        Ok(Self {
            config,
            http_client,
            verifier,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// Send an authenticated request and decode the body.
    ///
    /// A 404 yields `Ok(None)`; callers that require the object convert it.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Option<T>, BillingError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "Stripe request did not complete");
                transport_error(e)
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_response(status, &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                code = %err.code,
                provider_code = ?err.provider_code,
                "Stripe request failed"
            );
            return Err(err);
        }

        response.json::<T>().await.map(Some).map_err(|e| {
            BillingError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }

    async fn send_required<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        resource: &str,
        request: RequestBuilder,
    ) -> Result<T, BillingError> {
        self.send(operation, request)
            .await?
            .ok_or_else(|| BillingError::not_found(resource))
    }
}

fn transport_error(err: reqwest::Error) -> BillingError {
    if err.is_timeout() {
        BillingError::timeout(format!("Stripe request timed out: {}", err))
    } else {
        BillingError::network(err.to_string())
    }
}

/// Classify a non-2xx Stripe response.
pub(crate) fn error_from_response(status: StatusCode, body: &str) -> BillingError {
    let parsed = serde_json::from_str::<StripeErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.error.message.clone())
        .unwrap_or_else(|| format!("Stripe API error ({})", status.as_u16()));

    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BillingErrorCode::AuthenticationError,
        StatusCode::PAYMENT_REQUIRED => BillingErrorCode::CardDeclined,
        StatusCode::NOT_FOUND => BillingErrorCode::NotFound,
        StatusCode::TOO_MANY_REQUESTS => BillingErrorCode::RateLimitExceeded,
        _ => BillingErrorCode::ProviderError,
    };

    let mut err = BillingError::new(code, message);
    if status.is_server_error() {
        err = err.with_retryable(true);
    }
    if let Some(provider_code) = parsed.and_then(|b| b.error.code.or(b.error.error_type)) {
        err = err.with_provider_code(provider_code);
    }
    err
}

#[async_trait]
impl BillingProvider for StripeBillingAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, BillingError> {
        let params = vec![
            ("email", request.email.clone()),
            ("name", request.name.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];

        let mut builder = self.http_client.post(self.url("/v1/customers")).form(&params);
        if let Some(key) = &request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let customer: StripeCustomer = self
            .send_required("create_customer", "Customer", builder)
            .await?;

        tracing::info!(
            user_id = %request.user_id,
            customer_id = %customer.id,
            "Stripe customer created"
        );
        Ok(customer.into())
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, BillingError> {
        let params = vec![
            ("customer", request.customer_id.clone()),
            ("items[0][price]", request.price_id.clone()),
            ("payment_behavior", "default_incomplete".to_string()),
            (
                "payment_settings[save_default_payment_method]",
                "on_subscription".to_string(),
            ),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
        ];

        let mut builder = self
            .http_client
            .post(self.url("/v1/subscriptions"))
            .form(&params);
        if let Some(key) = &request.idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }

        let stripe_sub: StripeSubscription = self
            .send_required("create_subscription", "Price", builder)
            .await?;
        let client_secret = stripe_sub.expanded_client_secret();
        let subscription = ProviderSubscription::try_from(stripe_sub)?;

        tracing::info!(
            customer_id = %subscription.customer_id,
            subscription_id = %subscription.id,
            status = %subscription.status,
            "Stripe subscription created"
        );
        Ok(CreatedSubscription {
            subscription,
            client_secret,
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, BillingError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/subscriptions/{}", subscription_id)));

        self.send::<StripeSubscription>("retrieve_subscription", builder)
            .await?
            .map(ProviderSubscription::try_from)
            .transpose()
    }

    async fn retrieve_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/invoices/{}", invoice_id)));

        Ok(self
            .send::<StripeInvoice>("retrieve_invoice", builder)
            .await?
            .map(Invoice::from))
    }

    async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentIntent>, BillingError> {
        let builder = self
            .http_client
            .get(self.url(&format!("/v1/payment_intents/{}", payment_intent_id)));

        Ok(self
            .send::<StripePaymentIntent>("retrieve_payment_intent", builder)
            .await?
            .map(PaymentIntent::from))
    }

    async fn list_subscriptions(
        &self,
        customer_id: &str,
        status: &SubscriptionStatus,
    ) -> Result<Vec<ProviderSubscription>, BillingError> {
        let builder = self
            .http_client
            .get(self.url("/v1/subscriptions"))
            .query(&[("customer", customer_id), ("status", status.as_str())]);

        let list: StripeList<StripeSubscription> = self
            .send_required("list_subscriptions", "Customer", builder)
            .await?;

        list.data
            .into_iter()
            .map(ProviderSubscription::try_from)
            .collect()
    }

    async fn list_prices(&self, lookup_keys: &[String]) -> Result<Vec<Price>, BillingError> {
        let mut query: Vec<(&str, &str)> = vec![("active", "true"), ("expand[]", "data.product")];
        query.extend(lookup_keys.iter().map(|key| ("lookup_keys[]", key.as_str())));

        let builder = self.http_client.get(self.url("/v1/prices")).query(&query);

        let list: StripeList<StripePrice> =
            self.send_required("list_prices", "Price", builder).await?;

        Ok(list.data.into_iter().map(Price::from).collect())
    }

    async fn create_billing_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<PortalSession, BillingError> {
        let builder = self
            .http_client
            .post(self.url("/v1/billing_portal/sessions"))
            .form(&[("customer", customer_id), ("return_url", return_url)]);

        let session: StripePortalSession = self
            .send_required("create_billing_portal_session", "Customer", builder)
            .await?;

        Ok(PortalSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        self.verifier.verify(payload, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use axum::extract::{Form, Path, State};
    use axum::http::{HeaderMap, StatusCode as HttpStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(Option<String>, HashMap<String, String>)>>>;

    async fn spawn_fake_stripe(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn adapter(base_url: &str) -> StripeBillingAdapter {
        StripeBillingAdapter::new(
            StripeConfig::new("sk_test_key", "whsec_test_secret").with_base_url(base_url),
        )
        .unwrap()
    }

    fn subscription_json(status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "sub_123",
            "object": "subscription",
            "customer": "cus_1",
            "status": status,
            "current_period_start": 1704067200,
            "current_period_end": 1706745600,
            "cancel_at_period_end": false,
            "latest_invoice": {
                "id": "in_1",
                "customer": "cus_1",
                "subscription": "sub_123",
                "status": "open",
                "payment_intent": {
                    "id": "pi_1",
                    "status": "requires_payment_method",
                    "client_secret": "pi_1_secret_xyz"
                }
            },
            "items": { "data": [{ "id": "si_1", "price": { "id": "price_123", "currency": "jpy" } }] }
        })
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn config_new_sets_defaults() {
        let config = StripeConfig::new("api_key", "webhook_secret");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert!(!config.require_livemode);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_from_payment_config() {
        let payment = PaymentConfig {
            stripe_api_key: "sk_live_key".to_string(),
            stripe_webhook_secret: "whsec_secret".to_string(),
            provider_timeout_secs: 4,
            require_livemode: true,
            ..Default::default()
        };
        let config = StripeConfig::from_payment_config(&payment);
        assert_eq!(config.api_key.expose_secret(), "sk_live_key");
        assert!(config.require_livemode);
        assert_eq!(config.request_timeout, Duration::from_secs(4));
    }

    #[test]
    fn config_with_base_url() {
        let config = StripeConfig::new("key", "secret").with_base_url("http://localhost:8080");
        assert_eq!(config.api_base_url, "http://localhost:8080");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Error Mapping Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn card_error_keeps_stripe_message_and_code() {
        let body = r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#;
        let err = error_from_response(StatusCode::PAYMENT_REQUIRED, body);

        assert_eq!(err.code, BillingErrorCode::CardDeclined);
        assert_eq!(err.message, "Your card was declined.");
        assert_eq!(err.provider_code.as_deref(), Some("card_declined"));
        assert!(!err.retryable);
    }

    #[test]
    fn rate_limit_is_retryable() {
        let err = error_from_response(StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(err.code, BillingErrorCode::RateLimitExceeded);
        assert!(err.retryable);
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = error_from_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.code, BillingErrorCode::ProviderError);
        assert!(err.retryable);
        assert_eq!(err.message, "Stripe API error (502)");
    }

    #[test]
    fn bad_key_is_authentication_error() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"Invalid API Key provided"}}"#;
        let err = error_from_response(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.code, BillingErrorCode::AuthenticationError);
        assert_eq!(err.provider_code.as_deref(), Some("invalid_request_error"));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // HTTP Tests (local fake Stripe)
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn create_subscription_sends_incomplete_request_with_idempotency_key() {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/v1/subscriptions",
                post(
                    |State(captured): State<Captured>,
                     headers: HeaderMap,
                     Form(form): Form<HashMap<String, String>>| async move {
                        let key = headers
                            .get("Idempotency-Key")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        captured.lock().unwrap().push((key, form));
                        Json(subscription_json("incomplete"))
                    },
                ),
            )
            .with_state(captured.clone());
        let base = spawn_fake_stripe(router).await;

        let created = adapter(&base)
            .create_subscription(CreateSubscriptionRequest {
                customer_id: "cus_1".into(),
                price_id: "price_123".into(),
                idempotency_key: Some("checkout-u1-price_123-0".into()),
            })
            .await
            .unwrap();

        assert_eq!(created.client_secret.as_deref(), Some("pi_1_secret_xyz"));
        assert_eq!(created.subscription.status, SubscriptionStatus::Incomplete);

        let calls = captured.lock().unwrap();
        let (key, form) = &calls[0];
        assert_eq!(key.as_deref(), Some("checkout-u1-price_123-0"));
        assert_eq!(form["payment_behavior"], "default_incomplete");
        assert_eq!(form["items[0][price]"], "price_123");
        assert_eq!(form["expand[]"], "latest_invoice.payment_intent");
    }

    #[tokio::test]
    async fn create_customer_stores_user_id_metadata() {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/v1/customers",
                post(
                    |State(captured): State<Captured>,
                     headers: HeaderMap,
                     Form(form): Form<HashMap<String, String>>| async move {
                        let key = headers
                            .get("Idempotency-Key")
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        captured.lock().unwrap().push((key, form));
                        Json(serde_json::json!({
                            "id": "cus_new",
                            "email": "ada@example.com",
                            "name": "Ada",
                            "created": 1704067200
                        }))
                    },
                ),
            )
            .with_state(captured.clone());
        let base = spawn_fake_stripe(router).await;

        let customer = adapter(&base)
            .create_customer(CreateCustomerRequest {
                user_id: UserId::new("user-1").unwrap(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
                idempotency_key: Some("customer-user-1".into()),
            })
            .await
            .unwrap();

        assert_eq!(customer.id, "cus_new");
        let calls = captured.lock().unwrap();
        assert_eq!(calls[0].0.as_deref(), Some("customer-user-1"));
        assert_eq!(calls[0].1["metadata[user_id]"], "user-1");
    }

    #[tokio::test]
    async fn retrieve_subscription_maps_404_to_none() {
        let router = Router::new().route(
            "/v1/subscriptions/:id",
            get(|Path(id): Path<String>| async move {
                if id == "sub_123" {
                    (HttpStatus::OK, Json(subscription_json("active")))
                } else {
                    (
                        HttpStatus::NOT_FOUND,
                        Json(serde_json::json!({
                            "error": { "type": "invalid_request_error", "code": "resource_missing" }
                        })),
                    )
                }
            }),
        );
        let base = spawn_fake_stripe(router).await;
        let adapter = adapter(&base);

        let found = adapter.retrieve_subscription("sub_123").await.unwrap().unwrap();
        assert_eq!(found.status, SubscriptionStatus::Active);
        assert_eq!(found.latest_invoice_id.as_deref(), Some("in_1"));

        assert!(adapter.retrieve_subscription("sub_gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn server_error_surfaces_as_retryable() {
        let router = Router::new().route(
            "/v1/invoices/:id",
            get(|| async { HttpStatus::SERVICE_UNAVAILABLE }),
        );
        let base = spawn_fake_stripe(router).await;

        let err = adapter(&base).retrieve_invoice("in_1").await.unwrap_err();
        assert!(err.retryable);
    }

    #[tokio::test]
    async fn slow_stripe_times_out() {
        let router = Router::new().route(
            "/v1/payment_intents/:id",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                HttpStatus::OK
            }),
        );
        let base = spawn_fake_stripe(router).await;
        let adapter = StripeBillingAdapter::new(
            StripeConfig::new("sk_test_key", "whsec_test_secret")
                .with_base_url(base)
                .with_timeout(Duration::from_millis(100)),
        )
        .unwrap();

        let err = adapter.retrieve_payment_intent("pi_1").await.unwrap_err();
        assert_eq!(err.code, BillingErrorCode::Timeout);
        assert!(err.retryable);
    }

    #[tokio::test]
    async fn verify_webhook_uses_configured_secret() {
        let adapter = adapter("http://127.0.0.1:9");
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "data": { "object": { "id": "sub_123", "customer": "cus_1" } },
            "livemode": false
        })
        .to_string();
        let signer = WebhookVerifier::new(SecretString::new("whsec_test_secret".to_string()));
        let header = signer.signature_header_for(payload.as_bytes(), chrono::Utc::now().timestamp());

        let event = adapter.verify_webhook(payload.as_bytes(), &header).await.unwrap();
        assert_eq!(event.data.subscription_id(), Some("sub_123"));

        let err = adapter
            .verify_webhook(payload.as_bytes(), "t=1,v1=00")
            .await
            .unwrap_err();
        assert_eq!(err.code, BillingErrorCode::InvalidWebhook);
    }
}
