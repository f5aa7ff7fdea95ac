//! Safe coercion helpers shared by every provider adapter, the store writer
//! and the feature builder.
//!
//! Providers disagree about types: the same field arrives as a number, a
//! numeric string, `null`, or a nested object depending on the source and the
//! day of the week. The rule everywhere is the same: degrade to a documented
//! default and log, never abort the record.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::warn;

/// Default display name for a missing or malformed string field.
pub const UNKNOWN: &str = "Unknown";

/// Coerce an arbitrary JSON value to `f64`.
///
/// Accepts numbers, booleans and numeric strings. Anything else (null,
/// objects, arrays, non-numeric strings) yields `0.0` with a warning.
pub fn safe_numeric(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                warn!("non-numeric string {:?}, coercing to 0.0", s);
                0.0
            }
        },
        Value::Null => 0.0,
        other => {
            warn!("unexpected nested value {}, coercing to 0.0", other);
            0.0
        }
    }
}

/// Coerce an arbitrary JSON value to `i64`, truncating fractional parts.
pub fn safe_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_else(|| n.as_f64().unwrap_or(0.0) as i64),
        _ => safe_numeric(value) as i64,
    }
}

/// Coerce an arbitrary JSON value to a display string.
///
/// Missing, null or non-scalar values become [`UNKNOWN`]; numbers are
/// rendered as text so upstream type drift never loses a record.
pub fn safe_str(value: &Value) -> String {
    match value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Parse a provider timestamp into UTC.
///
/// Sources mix RFC-3339 with offset ("2025-04-08T15:00:00+02:00") and naive
/// strings ("2025-04-08 15:00"); naive values are taken as UTC. Unparsable
/// input falls back to `Utc::now()` with a warning so a bad timestamp never
/// blocks a write.
pub fn parse_kickoff(raw: &str) -> DateTime<Utc> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return naive.and_utc();
        }
    }
    warn!("unparsable timestamp {:?}, substituting now", raw);
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_safe_numeric_plain_number() {
        assert_relative_eq!(safe_numeric(&json!(1.8)), 1.8);
        assert_relative_eq!(safe_numeric(&json!(3)), 3.0);
    }

    #[test]
    fn test_safe_numeric_numeric_string() {
        assert_relative_eq!(safe_numeric(&json!("2.5")), 2.5);
        assert_relative_eq!(safe_numeric(&json!(" 4 ")), 4.0);
    }

    #[test]
    fn test_safe_numeric_null_is_zero() {
        assert_relative_eq!(safe_numeric(&Value::Null), 0.0);
    }

    #[test]
    fn test_safe_numeric_nested_object_is_zero() {
        assert_relative_eq!(safe_numeric(&json!({"avg": 1.8})), 0.0);
        assert_relative_eq!(safe_numeric(&json!([1, 2])), 0.0);
    }

    #[test]
    fn test_safe_numeric_garbage_string_is_zero() {
        assert_relative_eq!(safe_numeric(&json!("n/a")), 0.0);
    }

    #[test]
    fn test_safe_i64_truncates() {
        assert_eq!(safe_i64(&json!(2.9)), 2);
        assert_eq!(safe_i64(&json!("4")), 4);
        assert_eq!(safe_i64(&Value::Null), 0);
    }

    #[test]
    fn test_safe_str_defaults() {
        assert_eq!(safe_str(&json!("Arsenal")), "Arsenal");
        assert_eq!(safe_str(&json!("  ")), UNKNOWN);
        assert_eq!(safe_str(&Value::Null), UNKNOWN);
        assert_eq!(safe_str(&json!(7)), "7");
    }

    #[test]
    fn test_parse_kickoff_rfc3339_offset() {
        let dt = parse_kickoff("2025-04-08T15:00:00+02:00");
        assert_eq!(dt.to_rfc3339(), "2025-04-08T13:00:00+00:00");
    }

    #[test]
    fn test_parse_kickoff_naive_assumed_utc() {
        let dt = parse_kickoff("2025-04-08 15:00");
        assert_eq!(dt.to_rfc3339(), "2025-04-08T15:00:00+00:00");
    }

    #[test]
    fn test_parse_kickoff_garbage_falls_back_to_now() {
        let before = Utc::now();
        let dt = parse_kickoff("soonish");
        assert!(dt >= before);
    }
}
