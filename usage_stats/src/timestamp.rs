//! Timestamp parsing and conversion helpers.
//!
//! Warehouse system tables report timestamps without an offset, on the
//! warehouse clock, which is UTC. Drivers and fixtures may also hand us
//! RFC-3339 text with an explicit offset. Both are accepted here:
//! - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
//! - "2024-03-10 14:30:00.123456" -> "2024-03-10T14:30:00.123456Z"

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// RFC-3339 with offset -> UTC.
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Parse a warehouse timestamp: RFC-3339, or a naive datetime taken as UTC.
pub fn parse_warehouse_ts(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = parse_ts_to_utc(s) {
        return Some(dt);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Milliseconds since the Unix epoch.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offsets_are_converted_to_utc() {
        let got = parse_warehouse_ts("2024-03-10T09:30:00-05:00").unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap());
    }

    #[test]
    fn naive_warehouse_format_is_utc() {
        let got = parse_warehouse_ts("2024-03-10 14:30:00").unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap());

        let frac = parse_warehouse_ts("2024-03-10 14:30:00.250").unwrap();
        assert_eq!(to_millis(frac) - to_millis(got), 250);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_warehouse_ts("yesterday").is_none());
        assert!(parse_ts_to_utc("2024-03-10 14:30:00").is_err());
    }
}
