//! Wall-clock helpers shared by the token, lifecycle and query code.
//!
//! All persisted timestamps are Unix seconds in UTC.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate};

/// Returns the current time as a Unix timestamp (seconds since epoch).
#[allow(clippy::cast_possible_wrap)]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Calendar date (UTC) a Unix timestamp falls on.
pub fn utc_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

/// First second of the given UTC date.
pub fn start_of_day(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map_or(0, |dt| dt.and_utc().timestamp())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unix_timestamp_is_reasonable() {
        // Should be after 2024-01-01
        assert!(unix_timestamp() > 1_704_067_200);
    }

    #[test]
    fn utc_date_matches_start_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let start = start_of_day(date);
        assert_eq!(utc_date(start), Some(date));
        assert_eq!(utc_date(start + 86_399), Some(date));
        assert_ne!(utc_date(start + 86_400), Some(date));
    }
}
