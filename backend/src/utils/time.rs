use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Which end of a range a date-only value is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Start,
    End,
}

/// Parses RFC3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` or a bare
/// `YYYY-MM-DD`. Bare dates expand to the first or last second of the day.
pub fn parse_datetime_value(value: &str, bound: RangeBound) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = match bound {
            RangeBound::Start => NaiveTime::from_hms_opt(0, 0, 0),
            RangeBound::End => NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999),
        }?;
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(
            NaiveDateTime::new(date, time),
            Utc,
        ));
    }
    None
}

/// Upper bound for any retention window, in days.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Instant before which entries count as older than `days`. Saturates at
/// the earliest representable instant.
pub fn retention_cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_datetime_value("2025-01-10T09:00:00+09:00", RangeBound::Start)
            .expect("parse");
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_naive_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 10, 12, 30, 0).unwrap();
        assert_eq!(
            parse_datetime_value("2025-01-10T12:30:00", RangeBound::Start),
            Some(expected)
        );
        assert_eq!(
            parse_datetime_value("2025-01-10 12:30:00", RangeBound::End),
            Some(expected)
        );
    }

    #[test]
    fn bare_dates_expand_to_day_bounds() {
        let start = parse_datetime_value("2025-01-10", RangeBound::Start).expect("start");
        let end = parse_datetime_value("2025-01-10", RangeBound::End).expect("end");

        assert_eq!(start, Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap());
        assert_eq!(end.date_naive(), start.date_naive());
        assert!(end > Utc.with_ymd_and_hms(2025, 1, 10, 23, 59, 59).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_datetime_value("yesterday", RangeBound::Start).is_none());
        assert!(parse_datetime_value("2025-13-40", RangeBound::End).is_none());
    }

    #[test]
    fn retention_cutoff_subtracts_whole_days() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 8, 0, 0).unwrap();
        assert_eq!(
            retention_cutoff(now, 90),
            Utc.with_ymd_and_hms(2024, 12, 31, 8, 0, 0).unwrap()
        );
        assert_eq!(retention_cutoff(now, 0), now);
    }

    #[test]
    fn retention_cutoff_saturates_for_huge_windows() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 8, 0, 0).unwrap();
        assert_eq!(retention_cutoff(now, u32::MAX), DateTime::<Utc>::MIN_UTC);
        assert!(retention_cutoff(now, MAX_RETENTION_DAYS) > DateTime::<Utc>::MIN_UTC);
    }
}
