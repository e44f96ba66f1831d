use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

pub mod aggregate;
pub mod code;
pub mod ide;
pub mod loader;
pub mod types;

pub use aggregate::Aggregator;
pub use loader::{load_analysis, LoadOptions};
pub use types::AnalysisData;

/// Parse a record timestamp into UTC.
///
/// Logs carry either RFC 3339 strings or epoch numbers; epoch values below
/// `1e12` are treated as seconds, everything else as milliseconds.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc)),
        Value::Number(number) => {
            let raw = number.as_f64()?;
            if !raw.is_finite() || raw <= 0.0 {
                return None;
            }
            let millis = if raw < 1e12 {
                (raw * 1000.0) as i64
            } else {
                raw as i64
            };
            Utc.timestamp_millis_opt(millis).single()
        }
        _ => None,
    }
}

/// UTC calendar date key for a parsed timestamp.
pub(crate) fn date_key(when: &DateTime<Utc>) -> String {
    when.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let when = parse_timestamp(&json!("2026-02-05T18:48:19.274Z")).unwrap();
        assert_eq!(date_key(&when), "2026-02-05");
    }

    #[test]
    fn test_parse_timestamp_offset_converts_to_utc() {
        // 23:30 at UTC-5 is already the next day in UTC.
        let when = parse_timestamp(&json!("2026-01-02T23:30:00-05:00")).unwrap();
        assert_eq!(date_key(&when), "2026-01-03");
    }

    #[test]
    fn test_parse_timestamp_epoch_spellings() {
        let seconds = parse_timestamp(&json!(1_770_000_000)).unwrap();
        let millis = parse_timestamp(&json!(1_770_000_000_000i64)).unwrap();
        assert_eq!(seconds, millis);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp(&json!("not a date")).is_none());
        assert!(parse_timestamp(&json!(null)).is_none());
        assert!(parse_timestamp(&json!(-5)).is_none());
        assert!(parse_timestamp(&json!(["2026-01-01"])).is_none());
    }

    #[test]
    fn test_epoch_zero_is_an_unset_sentinel() {
        // A zero-initialized timestamp field means "never set", not 1970.
        assert!(parse_timestamp(&json!(0)).is_none());
        assert!(parse_timestamp(&json!(0.0)).is_none());
    }
}
