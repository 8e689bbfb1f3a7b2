//! Lenient `createdAt` (de)serialization.
//!
//! The backend emits either RFC 3339 timestamps or zone-less local date-times
//! (`2024-05-01T09:30:00` / `2024-05-01T09:30:00.123`). Zone-less values are
//! taken as UTC. Output is always RFC 3339.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a timestamp in any accepted layout.
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Serde `serialize_with` helper.
pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339())
}

/// Serde `deserialize_with` helper.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parses_rfc3339_with_offset() {
        let dt = parse("2024-05-01T11:30:00+02:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_parses_zone_less_as_utc() {
        let dt = parse("2024-05-01T09:30:00.250").unwrap();
        assert_eq!(dt.timestamp_millis() % 1000, 250);
        assert_eq!(parse("2024-05-01 09:30:00").unwrap().timestamp(), 1714555800);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse("yesterday").is_none());
    }
}
