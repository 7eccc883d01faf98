//! Timestamp parsing for last-modified values.
//!
//! Extracts carry timestamps in whatever shape the source system exported:
//! ISO 8601, SAS `DATETIME` (`01JAN2024:10:22:33`) or US-style dates.
//! Anything that cannot be read becomes [`sentinel_timestamp`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d%b%Y:%H:%M:%S%.f",
    "%d%b%Y %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d%b%Y", "%d-%b-%Y", "%m/%d/%Y"];

/// `1900-01-01T12:40:25`, substituted for unreadable timestamps.
pub fn sentinel_timestamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|date| date.and_hms_opt(12, 40, 25))
        .unwrap_or_default()
}

/// Parse free text into a timestamp.
///
/// Zoned values are converted to UTC. Date-only values land on midnight.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let value = text.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(zoned) = DateTime::parse_from_rfc3339(value) {
        return Some(zoned.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, hh: u32, mm: u32, ss: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(hh, mm, ss)
            .unwrap()
    }

    #[test]
    fn test_iso_variants() {
        assert_eq!(
            parse_timestamp("2024-03-05T10:22:33"),
            Some(at(2024, 3, 5, 10, 22, 33))
        );
        assert_eq!(
            parse_timestamp("2024-03-05 10:22:33.250"),
            Some(at(2024, 3, 5, 10, 22, 33) + chrono::Duration::milliseconds(250))
        );
        assert_eq!(
            parse_timestamp("2024-03-05T10:22:33+02:00"),
            Some(at(2024, 3, 5, 8, 22, 33))
        );
        assert_eq!(parse_timestamp("2024-03-05"), Some(at(2024, 3, 5, 0, 0, 0)));
    }

    #[test]
    fn test_sas_datetime() {
        assert_eq!(
            parse_timestamp("05MAR2024:10:22:33"),
            Some(at(2024, 3, 5, 10, 22, 33))
        );
        assert_eq!(parse_timestamp("01JAN1900:12:40:25"), Some(sentinel_timestamp()));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("null"), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
