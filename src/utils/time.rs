use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};

/// Parse an audit log timestamp.
///
/// The format is `2023-05-12-08:30:15.123456+02:00`: date and time joined
/// by a dash, an optional fractional second, and a numeric UTC offset with
/// or without a colon.
pub fn parse_audit_timestamp(ts: &str) -> Result<DateTime<FixedOffset>> {
    let ts = ts.trim();
    DateTime::parse_from_str(ts, "%Y-%m-%d-%H:%M:%S%.f%:z")
        .or_else(|_| DateTime::parse_from_str(ts, "%Y-%m-%d-%H:%M:%S%.f%z"))
        .with_context(|| format!("Failed to parse audit timestamp: {ts}"))
}

/// Format a timestamp for display in reports.
pub fn format_timestamp(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.3f %:z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_audit_timestamp() {
        let dt = parse_audit_timestamp("2023-05-12-08:30:15.123456+02:00").unwrap();
        assert_eq!(dt.year(), 2023);
        assert_eq!(dt.month(), 5);
        assert_eq!(dt.day(), 12);
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.timestamp_subsec_micros(), 123_456);
        assert_eq!(dt.offset().local_minus_utc(), 2 * 3600);
    }

    #[test]
    fn test_parse_offset_without_colon() {
        let dt = parse_audit_timestamp("2023-05-12-08:30:15.123456-0500").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_parse_without_fraction() {
        let dt = parse_audit_timestamp("2023-05-12-08:30:15+00:00").unwrap();
        assert_eq!(dt.timestamp_subsec_micros(), 0);
    }

    #[test]
    fn test_reject_garbage() {
        assert!(parse_audit_timestamp("last tuesday").is_err());
        assert!(parse_audit_timestamp("2023-05-12 08:30:15").is_err());
    }

    #[test]
    fn test_format_timestamp() {
        let dt = parse_audit_timestamp("2023-05-12-08:30:15.123456+02:00").unwrap();
        assert_eq!(format_timestamp(&dt), "2023-05-12 08:30:15.123 +02:00");
    }
}
