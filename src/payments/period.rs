//! Billing period arithmetic.
//!
//! Calendar-aware: adding a month to Jan 31 lands on the last day of
//! February, never skips into March. All functions are pure so they can be
//! unit tested without a clock or a database.

use chrono::{DateTime, Duration, Months, Utc};

use crate::models::BillingInterval;

/// Default paid-trial length when no override is configured.
pub const DEFAULT_TRIAL_DAYS: i64 = 7;

/// Resolve the effective trial length: configured value clamped to 1..=31,
/// falling back to the default when unset (or when the env value failed to
/// parse upstream and arrived as None).
pub fn trial_days(configured: Option<i64>) -> i64 {
    configured.unwrap_or(DEFAULT_TRIAL_DAYS).clamp(1, 31)
}

/// Compute the end of the billing period starting at `now`.
pub fn compute_period_end(
    interval: BillingInterval,
    now: DateTime<Utc>,
    paid_trial_days: Option<i64>,
) -> DateTime<Utc> {
    match interval {
        BillingInterval::Monthly => add_months(now, 1),
        BillingInterval::Yearly => add_months(now, 12),
        BillingInterval::Trial => now + Duration::days(trial_days(paid_trial_days)),
    }
}

fn add_months(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    // checked_add_months clamps to the last day of the target month and
    // only fails at the far edge of chrono's representable range.
    now.checked_add_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_monthly_clamps_to_end_of_february() {
        // Jan 31 + 1 month must not skip to March
        let end = compute_period_end(BillingInterval::Monthly, utc(2024, 1, 31), None);
        assert_eq!(end, utc(2024, 2, 29));
    }

    #[test]
    fn test_monthly_non_leap_year() {
        let end = compute_period_end(BillingInterval::Monthly, utc(2023, 1, 31), None);
        assert_eq!(end, utc(2023, 2, 28));
    }

    #[test]
    fn test_monthly_plain_date() {
        let end = compute_period_end(BillingInterval::Monthly, utc(2024, 3, 15), None);
        assert_eq!(end, utc(2024, 4, 15));
    }

    #[test]
    fn test_yearly_adds_one_year() {
        let end = compute_period_end(BillingInterval::Yearly, utc(2024, 6, 1), None);
        assert_eq!(end, utc(2025, 6, 1));
    }

    #[test]
    fn test_yearly_from_leap_day() {
        let end = compute_period_end(BillingInterval::Yearly, utc(2024, 2, 29), None);
        assert_eq!(end, utc(2025, 2, 28));
    }

    #[test]
    fn test_trial_defaults_to_seven_days() {
        let start = utc(2024, 5, 10);
        let end = compute_period_end(BillingInterval::Trial, start, None);
        assert_eq!(end, start + Duration::days(7));
    }

    #[test]
    fn test_trial_clamps_to_thirty_one_days() {
        let start = utc(2024, 5, 10);
        let end = compute_period_end(BillingInterval::Trial, start, Some(45));
        assert_eq!(end, start + Duration::days(31));
    }

    #[test]
    fn test_trial_clamps_low_end() {
        let start = utc(2024, 5, 10);
        assert_eq!(
            compute_period_end(BillingInterval::Trial, start, Some(0)),
            start + Duration::days(1)
        );
        assert_eq!(
            compute_period_end(BillingInterval::Trial, start, Some(-3)),
            start + Duration::days(1)
        );
    }

    #[test]
    fn test_period_end_is_after_start() {
        let start = utc(2024, 12, 31);
        for interval in [
            BillingInterval::Monthly,
            BillingInterval::Yearly,
            BillingInterval::Trial,
        ] {
            assert!(compute_period_end(interval, start, None) > start);
        }
    }
}
