//! Premium entitlement evaluation.
//!
//! Entitlement requires the mirrored status to be `active` and the paid
//! period (plus a grace window) to still be running. A provider-side
//! immediate cancellation therefore revokes access at once, while a
//! cancel-at-period-end keeps `active` until the period runs out.

use chrono::Duration;

use crate::domain::foundation::Timestamp;

use super::record::SubscriptionRecord;

/// Grace window past `current_period_end` that covers renewal webhook latency.
pub const GRACE_PERIOD_HOURS: i64 = 24;

/// [`GRACE_PERIOD_HOURS`] as a duration.
pub fn grace_period() -> Duration {
    Duration::hours(GRACE_PERIOD_HOURS)
}

/// Returns whether the record grants premium access at `now`.
///
/// No record, or a record without a known period end, is never entitled.
pub fn is_entitled(record: Option<&SubscriptionRecord>, now: Timestamp) -> bool {
    let Some(record) = record else {
        return false;
    };
    let Some(period_end) = record.current_period_end else {
        return false;
    };

    // A period end too far out to add the grace window to is not trusted
    let Some(grace_end) = period_end.checked_plus(grace_period()) else {
        return false;
    };

    record.status.grants_entitlement() && now <= grace_end
}
