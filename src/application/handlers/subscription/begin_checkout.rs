//! BeginCheckoutHandler - Command handler that starts (or resumes) the first
//! payment of a subscription.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{SubscriptionError, SubscriptionRecord};
use crate::ports::{
    BillingProvider, CreateSubscriptionRequest, ProviderSubscription, SubscriptionStore,
    UserDirectory,
};

use super::ensure_customer::{EnsureCustomerCommand, EnsureCustomerHandler};
use super::provider_call::{call_provider, DEFAULT_PROVIDER_TIMEOUT};

/// Command to begin checkout for a price.
#[derive(Debug, Clone)]
pub struct BeginCheckoutCommand {
    pub user_id: UserId,
    pub price_id: String,
}

/// Result of beginning checkout.
#[derive(Debug, Clone)]
pub struct BeginCheckoutResult {
    /// Secret the payment form confirms against.
    pub client_secret: String,
    pub subscription_id: String,
    /// Whether an unfinished subscription was resumed instead of created.
    pub resumed: bool,
}

/// Handler for beginning checkout.
///
/// Nothing is written to the store until the provider has handed back a
/// usable client secret, so a failed attempt leaves the record as it was.
pub struct BeginCheckoutHandler {
    directory: Arc<dyn UserDirectory>,
    store: Arc<dyn SubscriptionStore>,
    provider: Arc<dyn BillingProvider>,
    ensure_customer: EnsureCustomerHandler,
    provider_timeout: Duration,
}

impl BeginCheckoutHandler {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn SubscriptionStore>,
        provider: Arc<dyn BillingProvider>,
    ) -> Self {
        let ensure_customer = EnsureCustomerHandler::new(store.clone(), provider.clone());
        Self {
            directory,
            store,
            provider,
            ensure_customer,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.ensure_customer = self.ensure_customer.with_provider_timeout(timeout);
        self.provider_timeout = timeout;
        self
    }

    pub async fn handle(
        &self,
        cmd: BeginCheckoutCommand,
    ) -> Result<BeginCheckoutResult, SubscriptionError> {
        // 1. Resolve the billing identity
        let profile = self
            .directory
            .find_profile(&cmd.user_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(format!("user {}", cmd.user_id)))?;
        let (name, email) = profile.billing_identity().ok_or_else(|| {
            SubscriptionError::not_found(format!("name or email for user {}", cmd.user_id))
        })?;

        // 2. Make sure a customer exists
        let mut record = self
            .ensure_customer
            .handle(EnsureCustomerCommand {
                user_id: cmd.user_id.clone(),
                name: name.to_string(),
                email: email.to_string(),
            })
            .await?
            .record;

        // 3. Never open a second subscription while Stripe can still bill one
        if let Some(subscription_id) = record.open_subscription_id().map(String::from) {
            let fetched = call_provider(
                self.provider_timeout,
                "retrieve_subscription",
                self.provider.retrieve_subscription(&subscription_id),
            )
            .await?;

            match fetched {
                Some(subscription) if subscription.status.is_awaiting_payment() => {
                    let client_secret = self.resume_secret(&subscription).await?;
                    tracing::info!(
                        user_id = %cmd.user_id,
                        subscription_id = %subscription.id,
                        "Resumed incomplete subscription"
                    );
                    return Ok(BeginCheckoutResult {
                        client_secret,
                        subscription_id: subscription.id,
                        resumed: true,
                    });
                }
                Some(subscription) if subscription.status.is_terminal() => {
                    tracing::info!(
                        user_id = %cmd.user_id,
                        subscription_id = %subscription.id,
                        status = %subscription.status,
                        "Previous subscription ended at the provider"
                    );
                    record = self.write_back(&cmd.user_id, &subscription).await?;
                }
                Some(subscription) => {
                    tracing::info!(
                        user_id = %cmd.user_id,
                        subscription_id = %subscription.id,
                        status = %subscription.status,
                        "Checkout refused, subscription still live"
                    );
                    self.write_back(&cmd.user_id, &subscription).await?;
                    return Err(SubscriptionError::already_subscribed(subscription.id));
                }
                None => {
                    tracing::warn!(
                        user_id = %cmd.user_id,
                        subscription_id = %subscription_id,
                        "Subscription on record no longer exists at the provider"
                    );
                }
            }
        }

        // 4. Create the subscription with its first payment left open
        let created = call_provider(
            self.provider_timeout,
            "create_subscription",
            self.provider.create_subscription(CreateSubscriptionRequest {
                customer_id: record.customer_id.clone(),
                price_id: cmd.price_id.clone(),
                idempotency_key: Some(checkout_idempotency_key(&record, &cmd.price_id)),
            }),
        )
        .await?;

        // 5. Only a usable secret lets the attempt land in the store
        let subscription = created.subscription;
        let client_secret = usable(created.client_secret)
            .ok_or_else(|| SubscriptionError::secret_unavailable(&subscription.id))?;

        self.write_back(&cmd.user_id, &subscription).await?;

        tracing::info!(
            user_id = %cmd.user_id,
            subscription_id = %subscription.id,
            price_id = %cmd.price_id,
            "Created subscription awaiting first payment"
        );

        Ok(BeginCheckoutResult {
            client_secret,
            subscription_id: subscription.id,
            resumed: false,
        })
    }

    /// Walks latest invoice, then payment intent, to the client secret.
    async fn resume_secret(
        &self,
        subscription: &ProviderSubscription,
    ) -> Result<String, SubscriptionError> {
        let unavailable = || SubscriptionError::secret_unavailable(&subscription.id);

        let invoice_id = subscription.latest_invoice_id.as_deref().ok_or_else(unavailable)?;
        let invoice = call_provider(
            self.provider_timeout,
            "retrieve_invoice",
            self.provider.retrieve_invoice(invoice_id),
        )
        .await?
        .ok_or_else(unavailable)?;

        let intent_id = invoice.payment_intent_id.as_deref().ok_or_else(unavailable)?;
        let intent = call_provider(
            self.provider_timeout,
            "retrieve_payment_intent",
            self.provider.retrieve_payment_intent(intent_id),
        )
        .await?
        .ok_or_else(unavailable)?;

        usable(intent.client_secret).ok_or_else(unavailable)
    }

    async fn write_back(
        &self,
        user_id: &UserId,
        subscription: &ProviderSubscription,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        self.store
            .upsert(user_id, &subscription.to_patch())
            .await?
            .ok_or_else(|| {
                SubscriptionError::infrastructure(format!(
                    "subscription record for user {} disappeared",
                    user_id
                ))
            })
    }
}

fn usable(secret: Option<String>) -> Option<String> {
    secret.filter(|s| !s.trim().is_empty())
}

/// Keyed on the record's last change so a retry of the same attempt replays
/// while a later attempt gets a fresh subscription.
fn checkout_idempotency_key(record: &SubscriptionRecord, price_id: &str) -> String {
    format!(
        "checkout-{}-{}-{}",
        record.user_id,
        price_id,
        record.updated_at.as_datetime().timestamp_micros()
    )
}
