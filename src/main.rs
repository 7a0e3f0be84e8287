//! Premium Sync server
//!
//! ## REST Endpoints
//!
//! - `GET /api/subscription` - Stored subscription for the billing settings page
//! - `GET /api/subscription/entitlement` - Premium entitlement check
//! - `GET /api/subscription/active` - Active Stripe subscriptions
//! - `POST /api/subscription/portal` - Open a Stripe customer portal session
//! - `GET /api/subscription/prices` - Pricing page prices
//! - `POST /api/subscription/checkout` - Begin or resume checkout
//! - `POST /api/webhooks/stripe` - Stripe webhook handler
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness check

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use sqlx::PgPool;
use thiserror::Error;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use premium_sync::adapters::http::subscription::{
    subscription_router, BillingSettings, SubscriptionAppState,
};
use premium_sync::adapters::postgres::{
    PostgresSubscriptionStore, PostgresUserDirectory, PostgresWebhookEventRepository,
};
use premium_sync::adapters::stripe::{StripeBillingAdapter, StripeConfig};
use premium_sync::config::{AppConfig, ConfigError, ServerConfig};
use premium_sync::ports::BillingError;

/// Failures that stop the server from starting.
#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("stripe client: {0}")]
    Billing(#[from] BillingError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load_validated()?;
    init_tracing(&config.server);

    tracing::info!(
        environment = ?config.server.environment,
        livemode = config.payment.is_live_mode(),
        "Starting premium-sync"
    );

    // Database
    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    // Adapters
    let stripe = StripeBillingAdapter::new(StripeConfig::from_payment_config(&config.payment))?;
    let state = build_state(pool, stripe, &config);

    let app = build_router(state, &config.server);

    let addr = config
        .server
        .socket_addr()
        .map_err(|e| StartupError::Config(e.into()))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

fn build_state(
    pool: PgPool,
    stripe: StripeBillingAdapter,
    config: &AppConfig,
) -> SubscriptionAppState {
    SubscriptionAppState {
        subscription_store: Arc::new(PostgresSubscriptionStore::new(pool.clone())),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool.clone())),
        user_directory: Arc::new(PostgresUserDirectory::new(pool)),
        billing_provider: Arc::new(stripe),
        settings: BillingSettings::from_config(config),
    }
}

fn build_router(state: SubscriptionAppState, server: &ServerConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(server))
        .layer(TimeoutLayer::new(server.request_timeout()));

    // Health stays outside the timeout
    Router::new()
        .nest("/api", subscription_router())
        .layer(middleware)
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
