//! Time utilities for identity validity and signing timestamps.
//!
//! Timestamps are truncated to whole seconds so that a value written into
//! an envelope and read back serializes to exactly the same text.

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Current time, whole seconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Validity window starting at `start` and lasting `days` days.
pub fn validity_window(start: DateTime<Utc>, days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    let not_before = start.trunc_subsecs(0);
    let not_after = not_before + Duration::days(i64::from(days));
    (not_before, not_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_is_reasonable() {
        let ts = now().timestamp();
        // Should be after 2024-01-01 (1704067200)
        assert!(ts > 1704067200, "Timestamp {} is too old", ts);
        // Should be before 2100-01-01 (4102444800)
        assert!(ts < 4102444800, "Timestamp {} is too far in future", ts);
    }

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(now().timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn test_validity_window_one_year() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let (not_before, not_after) = validity_window(start, 365);

        assert_eq!(not_before, start);
        assert_eq!(not_after, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
    }
}
