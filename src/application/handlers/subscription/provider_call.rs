//! Bounded calls to the billing provider.

use std::future::Future;
use std::time::Duration;

use crate::domain::subscription::SubscriptionError;
use crate::ports::BillingError;

/// Default per-call budget when a handler is not configured otherwise.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs one provider call under `timeout`.
///
/// An elapsed budget becomes `ProviderUnavailable`; provider failures are
/// mapped through `From<BillingError>`.
pub(crate) async fn call_provider<T, F>(
    timeout: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, SubscriptionError>
where
    F: Future<Output = Result<T, BillingError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::warn!(
                operation,
                code = %err.code,
                retryable = err.retryable,
                error = %err.message,
                "Billing provider call failed"
            );
            Err(err.into())
        }
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Billing provider call timed out"
            );
            Err(SubscriptionError::provider_unavailable(format!(
                "{} timed out after {}ms",
                operation,
                timeout.as_millis()
            )))
        }
    }
}
