use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Storage format for timestamps: fixed-width RFC 3339 with microseconds,
/// so that lexical order in SQLite matches time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp. Also accepts the bare `YYYY-MM-DD HH:MM:SS`
/// form SQLite's `datetime()` produces, read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stored_form_is_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2013, 1, 1, 10, 10, 9).unwrap();
        let late = Utc.with_ymd_and_hms(2013, 1, 1, 10, 10, 10).unwrap();

        let a = format_timestamp(early);
        let b = format_timestamp(late);
        assert_eq!(a, "2013-01-01T10:10:09.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&b), Some(late));
    }

    #[test]
    fn accepts_sqlite_datetime_form() {
        let parsed = parse_timestamp("2013-01-01 10:10:10").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2013, 1, 1, 10, 10, 10).unwrap());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
