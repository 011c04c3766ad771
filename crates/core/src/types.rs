use chrono::{NaiveDate, NaiveTime};

/// All persisted identifiers are opaque 128-bit UUIDs.
pub type DbId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new time-ordered identifier.
pub fn new_id() -> DbId {
    uuid::Uuid::now_v7()
}

/// Half-open UTC bounds `[start, end)` of a calendar date.
pub fn day_bounds(date: NaiveDate) -> (Timestamp, Timestamp) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

/// Whether `ts` falls on the given UTC calendar date.
pub fn falls_on(ts: Timestamp, date: NaiveDate) -> bool {
    ts.date_naive() == date
}

/// Case-insensitive substring match used by text filters.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_bounds_cover_one_day() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let (start, end) = day_bounds(date);
        assert_eq!(start, chrono::Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
        assert_eq!(end - start, chrono::Duration::days(1));
    }

    #[test]
    fn falls_on_uses_utc_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let late = chrono::Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 59).unwrap();
        let next = chrono::Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap();
        assert!(falls_on(late, date));
        assert!(!falls_on(next, date));
    }

    #[test]
    fn contains_ci_ignores_case() {
        assert!(contains_ci("Main Lobby HVAC", "hvac"));
        assert!(contains_ci("anything", ""));
        assert!(!contains_ci("Boiler", "chiller"));
    }
}
