//! Date/time utilities for arbor.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that the
//! database's lexical ordering matches chronological ordering.

use chrono::{DateTime, Utc};

/// Storage format for timestamps (microsecond precision, always `Z`).
const DB_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format a UTC datetime for storage.
pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// The current time, formatted for storage.
pub fn now_db() -> String {
    to_db(&Utc::now())
}

/// Milliseconds since the Unix epoch.
pub fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_to_db_fixed_width() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(to_db(&dt), "2024-01-15T10:30:00.000000Z");
    }

    #[test]
    fn test_to_db_orders_lexically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(1500);
        assert!(to_db(&earlier) < to_db(&later));
    }

    #[test]
    fn test_millis() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(to_millis(&dt), 1_705_314_600_000);
    }
}
