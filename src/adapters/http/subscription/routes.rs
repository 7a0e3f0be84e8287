//! Axum router configuration for subscription endpoints.
//!
//! This module defines the route structure for subscription-related API
//! endpoints and wires them to their corresponding handlers.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    begin_checkout, check_entitlement, create_portal_session, get_active_subscriptions,
    get_subscription, handle_stripe_webhook, list_prices, SubscriptionAppState,
};

/// Create the subscription API router.
///
/// # Routes
///
/// ## User Endpoints (require `X-User-Id`)
/// - `GET /` - Stored subscription, entitlement and renewal summary
/// - `GET /entitlement` - Whether the user may read premium posts
/// - `GET /active` - Active subscriptions as Stripe reports them
/// - `POST /portal` - Open a Stripe customer portal session
/// - `POST /checkout` - Begin or resume checkout
///
/// ## Public Endpoints
/// - `GET /prices` - Prices for the pricing page
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/", get(get_subscription))
        .route("/entitlement", get(check_entitlement))
        .route("/active", get(get_active_subscriptions))
        .route("/portal", post(create_portal_session))
        .route("/checkout", post(begin_checkout))
        .route("/prices", get(list_prices))
}

/// Create the Stripe webhook router.
///
/// This is separate from the subscription routes because webhooks
/// don't require user authentication (they're verified via signature).
///
/// # Routes
/// - `POST /stripe` - Handle Stripe webhooks
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete subscription module router, suitable for mounting
/// at `/api`.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api", subscription_router())
///     .with_state(app_state);
/// ```
pub fn subscription_router() -> Router<SubscriptionAppState> {
    Router::new()
        .nest("/subscription", subscription_routes())
        .nest("/webhooks", webhook_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::adapters::http::subscription::handlers::BillingSettings;
    use crate::adapters::memory::{
        InMemorySubscriptionStore, InMemoryUserDirectory, InMemoryWebhookEventRepository,
    };
    use crate::adapters::stripe::MockBillingProvider;

    fn test_state() -> SubscriptionAppState {
        SubscriptionAppState {
            subscription_store: Arc::new(InMemorySubscriptionStore::new()),
            webhook_events: Arc::new(InMemoryWebhookEventRepository::new()),
            user_directory: Arc::new(InMemoryUserDirectory::new()),
            billing_provider: Arc::new(MockBillingProvider::new()),
            settings: BillingSettings::default(),
        }
    }

    fn app() -> Router {
        Router::new()
            .nest("/api", subscription_router())
            .with_state(test_state())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Router Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn subscription_routes_creates_router() {
        let _: Router<()> = subscription_routes().with_state(test_state());
    }

    #[test]
    fn webhook_routes_creates_router() {
        let _: Router<()> = webhook_routes().with_state(test_state());
    }

    #[tokio::test]
    async fn user_endpoints_require_user_header() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/subscription/entitlement")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn entitlement_route_answers_for_unknown_user() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/subscription/entitlement")
                    .header("X-User-Id", "user-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["entitled"], false);
    }

    #[tokio::test]
    async fn portal_session_is_only_opened_by_post() {
        let request = |method: &str| {
            Request::builder()
                .method(method)
                .uri("/api/subscription/portal")
                .header("X-User-Id", "user-1")
                .body(Body::empty())
                .unwrap()
        };

        let response = app().oneshot(request("GET")).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        // No stored subscription yet, but the route is reached
        let response = app().oneshot(request("POST")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prices_route_is_public() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/subscription/prices")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_route_rejects_unsigned_delivery() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/webhooks/stripe")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
