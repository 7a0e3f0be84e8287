//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use axum::extract::{FromRequestParts, Json, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::handlers::subscription::{
    BeginCheckoutCommand, BeginCheckoutHandler, CheckEntitlementHandler, CheckEntitlementQuery,
    GetBillingPortalUrlHandler, GetBillingPortalUrlQuery, GetSubscriptionHandler,
    GetSubscriptionInfoHandler, GetSubscriptionInfoQuery, GetSubscriptionQuery,
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, ListPricesHandler,
    DEFAULT_PROVIDER_TIMEOUT,
};
use crate::config::AppConfig;
use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionError;
use crate::ports::{BillingProvider, SubscriptionStore, UserDirectory, WebhookEventRepository};

use super::dto::{
    ActiveSubscriptionResponse, ActiveSubscriptionsResponse, CheckoutRequest, CheckoutResponse,
    EntitlementResponse, ErrorResponse, PortalResponse, PriceResponse, PricesResponse,
    SubscriptionResponse, WebhookAckResponse,
};

/// Header carrying the Stripe webhook signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Billing settings the handlers need from configuration.
#[derive(Debug, Clone)]
pub struct BillingSettings {
    /// Where the billing portal sends the user back to.
    pub portal_return_url: String,
    /// Lookup keys of the prices offered on the pricing page.
    pub price_lookup_keys: Vec<String>,
    pub provider_timeout: Duration,
}

impl BillingSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            portal_return_url: config.server.billing_return_url(),
            price_lookup_keys: config.payment.lookup_keys(),
            provider_timeout: config.payment.provider_timeout(),
        }
    }
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            portal_return_url: "http://localhost:3000/settings/billing".to_string(),
            price_lookup_keys: vec!["monthly".to_string()],
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped dependencies
/// for efficient sharing across handlers.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub subscription_store: Arc<dyn SubscriptionStore>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub billing_provider: Arc<dyn BillingProvider>,
    pub settings: BillingSettings,
}

impl SubscriptionAppState {
    /// Create handlers on demand from the shared state.
    pub fn begin_checkout_handler(&self) -> BeginCheckoutHandler {
        BeginCheckoutHandler::new(
            self.user_directory.clone(),
            self.subscription_store.clone(),
            self.billing_provider.clone(),
        )
        .with_provider_timeout(self.settings.provider_timeout)
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.subscription_store.clone())
    }

    pub fn check_entitlement_handler(&self) -> CheckEntitlementHandler {
        CheckEntitlementHandler::new(self.subscription_store.clone())
    }

    pub fn subscription_info_handler(&self) -> GetSubscriptionInfoHandler {
        GetSubscriptionInfoHandler::new(
            self.subscription_store.clone(),
            self.billing_provider.clone(),
        )
        .with_provider_timeout(self.settings.provider_timeout)
    }

    pub fn portal_handler(&self) -> GetBillingPortalUrlHandler {
        GetBillingPortalUrlHandler::new(
            self.subscription_store.clone(),
            self.billing_provider.clone(),
            self.settings.portal_return_url.clone(),
        )
        .with_provider_timeout(self.settings.provider_timeout)
    }

    pub fn list_prices_handler(&self) -> ListPricesHandler {
        ListPricesHandler::new(
            self.billing_provider.clone(),
            self.settings.price_lookup_keys.clone(),
        )
        .with_provider_timeout(self.settings.provider_timeout)
    }

    pub fn webhook_handler(&self) -> HandleBillingWebhookHandler {
        HandleBillingWebhookHandler::new(
            self.billing_provider.clone(),
            self.subscription_store.clone(),
            self.webhook_events.clone(),
        )
        .with_provider_timeout(self.settings.provider_timeout)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Request Context
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
///
/// Identity is asserted by the platform's auth layer in front of this
/// service through the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

/// Language of user-facing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    /// Picks the supported language with the highest `q` weight.
    pub fn from_accept_language(value: &str) -> Self {
        let mut best: Option<(f32, Locale)> = None;

        for entry in value.split(',') {
            let mut parts = entry.trim().split(';');
            let tag = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            let quality = parts
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);

            let locale = match tag.split('-').next() {
                Some("ja") => Locale::Ja,
                Some("en") => Locale::En,
                _ => continue,
            };
            if quality > 0.0 && best.map_or(true, |(q, _)| quality > q) {
                best = Some((quality, locale));
            }
        }

        best.map(|(_, locale)| locale).unwrap_or_default()
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(axum::http::header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .map(Self::from_accept_language)
            .unwrap_or_default()
    }

    /// Wraps an error for rendering in this locale.
    pub fn error(self, error: SubscriptionError) -> SubscriptionApiError {
        SubscriptionApiError {
            error,
            locale: self,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscription - Stored subscription for the billing settings page
pub async fn get_subscription(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    locale: Locale,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.get_subscription_handler();
    let query = GetSubscriptionQuery {
        user_id: user.user_id,
    };

    let result = handler.handle(query).await.map_err(|e| locale.error(e))?;

    Ok(Json(SubscriptionResponse::from(result)))
}

/// GET /api/subscription/entitlement - Whether the user may read premium posts
pub async fn check_entitlement(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let handler = state.check_entitlement_handler();
    let query = CheckEntitlementQuery {
        user_id: user.user_id,
    };

    let result = handler.handle(query).await;

    Json(EntitlementResponse {
        entitled: result.entitled,
    })
}

/// GET /api/subscription/active - Active subscriptions as Stripe reports them
pub async fn get_active_subscriptions(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    locale: Locale,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.subscription_info_handler();
    let query = GetSubscriptionInfoQuery {
        user_id: user.user_id,
    };

    let result = handler.handle(query).await.map_err(|e| locale.error(e))?;

    let response = ActiveSubscriptionsResponse {
        subscriptions: result
            .subscriptions
            .into_iter()
            .map(ActiveSubscriptionResponse::from)
            .collect(),
    };
    Ok(Json(response))
}

/// POST /api/subscription/portal - Open a Stripe customer portal session
pub async fn create_portal_session(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    locale: Locale,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.portal_handler();
    let query = GetBillingPortalUrlQuery {
        user_id: user.user_id,
    };

    let result = handler.handle(query).await.map_err(|e| locale.error(e))?;

    Ok(Json(PortalResponse { url: result.url }))
}

/// GET /api/subscription/prices - Prices for the pricing page
pub async fn list_prices(
    State(state): State<SubscriptionAppState>,
    locale: Locale,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let result = state
        .list_prices_handler()
        .handle()
        .await
        .map_err(|e| locale.error(e))?;

    let response = PricesResponse {
        prices: result.prices.into_iter().map(PriceResponse::from).collect(),
    };
    Ok(Json(response))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscription/checkout - Begin or resume checkout
pub async fn begin_checkout(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    locale: Locale,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.begin_checkout_handler();
    let cmd = BeginCheckoutCommand {
        user_id: user.user_id,
        price_id: request.price_id,
    };

    let result = handler.handle(cmd).await.map_err(|e| locale.error(e))?;

    let response = CheckoutResponse {
        client_secret: result.client_secret,
        subscription_id: result.subscription_id,
    };
    Ok(Json(response))
}

/// POST /api/webhooks/stripe - Handle Stripe webhook events
pub async fn handle_stripe_webhook(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Webhook delivery without signature header");
            SubscriptionError::InvalidSignature("missing Stripe-Signature header".to_string())
        })?;

    let handler = state.webhook_handler();
    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    let ack = handler.handle(cmd).await?;

    Ok((StatusCode::OK, Json(WebhookAckResponse::from(ack))))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct SubscriptionApiError {
    error: SubscriptionError,
    locale: Locale,
}

impl SubscriptionApiError {
    pub fn status(&self) -> StatusCode {
        match &self.error {
            SubscriptionError::NotFound(_) | SubscriptionError::NoSubscription(_) => {
                StatusCode::NOT_FOUND
            }
            SubscriptionError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::AlreadySubscribed { .. } => StatusCode::CONFLICT,
            SubscriptionError::SecretUnavailable { .. } | SubscriptionError::Provider(_) => {
                StatusCode::BAD_GATEWAY
            }
            SubscriptionError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SubscriptionError::UnknownCustomer(_) | SubscriptionError::Infrastructure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the user. Internal details stay in the logs.
    pub fn message(&self) -> &'static str {
        match (self.locale, &self.error) {
            (Locale::En, SubscriptionError::NotFound(_)) => "User not found",
            (Locale::Ja, SubscriptionError::NotFound(_)) => "ユーザーが見つかりません",
            (Locale::En, SubscriptionError::NoSubscription(_)) => "No subscription found",
            (Locale::Ja, SubscriptionError::NoSubscription(_)) => {
                "サブスクリプションが見つかりません"
            }
            (Locale::En, SubscriptionError::SecretUnavailable { .. }) => {
                "Could not obtain the client secret"
            }
            (Locale::Ja, SubscriptionError::SecretUnavailable { .. }) => {
                "クライアントシークレットが取得できませんでした"
            }
            (Locale::En, SubscriptionError::AlreadySubscribed { .. }) => {
                "You already have an active subscription"
            }
            (Locale::Ja, SubscriptionError::AlreadySubscribed { .. }) => {
                "すでにサブスクリプションが有効です"
            }
            (Locale::En, SubscriptionError::InvalidSignature(_)) => "Invalid webhook signature",
            (Locale::Ja, SubscriptionError::InvalidSignature(_)) => "署名が不正です",
            (Locale::En, SubscriptionError::ProviderUnavailable(_)) => {
                "The payment service is temporarily unavailable. Please try again later"
            }
            (Locale::Ja, SubscriptionError::ProviderUnavailable(_)) => {
                "決済サービスに接続できませんでした。しばらくしてから再度お試しください"
            }
            (Locale::En, SubscriptionError::Provider(_)) => {
                "The payment service rejected the request"
            }
            (Locale::Ja, SubscriptionError::Provider(_)) => "決済サービスでエラーが発生しました",
            (Locale::En, SubscriptionError::UnknownCustomer(_)) => {
                "Your subscription is not ready yet. Please try again later"
            }
            (Locale::Ja, SubscriptionError::UnknownCustomer(_)) => {
                "サブスクリプションの準備ができていません。しばらくしてから再度お試しください"
            }
            (Locale::En, SubscriptionError::Infrastructure(_)) => "An error occurred",
            (Locale::Ja, SubscriptionError::Infrastructure(_)) => "エラーが発生しました。",
        }
    }
}

impl From<SubscriptionError> for SubscriptionApiError {
    fn from(error: SubscriptionError) -> Self {
        Locale::default().error(error)
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.error.code(), error = %self.error, "Request failed");
        } else {
            tracing::debug!(code = self.error.code(), error = %self.error, "Request rejected");
        }

        let body = ErrorResponse::new(self.error.code(), self.message())
            .retryable(self.error.is_retryable());
        (status, Json(body)).into_response()
    }
}
