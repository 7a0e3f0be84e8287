//! Subscription domain - the mirrored billing record and entitlement rules.
//!
//! # Module Organization
//!
//! - `record` - `SubscriptionRecord` and the `SubscriptionPatch` that overwrites it
//! - `status` - status mirrored from the billing provider
//! - `entitlement` - premium access with a grace window
//! - `events` - provider events consumed by the reconciler
//! - `content_access` - premium post preview gating
//! - `errors` - the closed error taxonomy

mod content_access;
mod entitlement;
mod errors;
mod events;
mod record;
mod status;

pub use content_access::{ContentAccess, PREVIEW_CHARS};
pub use entitlement::{grace_period, is_entitled, GRACE_PERIOD_HOURS};
pub use errors::SubscriptionError;
pub use events::{ProviderEvent, ProviderEventKind};
pub use record::{BillingSummary, SubscriptionPatch, SubscriptionRecord};
pub use status::SubscriptionStatus;
