//! Query Result - JSON-safe result shapes returned by the data layer

use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use serde::Serialize;
use serde_json::Value as Json;

/// Rows returned by `execute_query`, capped at `QUERY_ROW_CAP`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Json>>,
    /// Size of the full result, before capping.
    pub row_count: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Outcome of an arbitrary SQL statement. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome {
    Rows(QueryResult),
    Failed { error: String },
}

impl QueryOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            QueryOutcome::Failed { error } => Some(error),
            QueryOutcome::Rows(_) => None,
        }
    }
}

/// Rows returned by `sample_data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Json>>,
}

/// Convert a float, mapping NaN and the infinities to null.
pub fn float_to_json(f: f64) -> Json {
    serde_json::Number::from_f64(f)
        .map(Json::Number)
        .unwrap_or(Json::Null)
}

/// Convert a DuckDB value to a JSON-safe value.
///
/// Scalars pass through, non-finite floats become null, temporal values are
/// rendered as ISO-like strings and anything else is stringified.
pub fn value_to_json(value: Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(b),
        Value::TinyInt(i) => Json::from(i),
        Value::SmallInt(i) => Json::from(i),
        Value::Int(i) => Json::from(i),
        Value::BigInt(i) => Json::from(i),
        Value::HugeInt(i) => match i64::try_from(i) {
            Ok(small) => Json::from(small),
            Err(_) => Json::String(i.to_string()),
        },
        Value::UHugeInt(u) => match u64::try_from(u) {
            Ok(small) => Json::from(small),
            Err(_) => Json::String(u.to_string()),
        },
        Value::UTinyInt(u) => Json::from(u),
        Value::USmallInt(u) => Json::from(u),
        Value::UInt(u) => Json::from(u),
        Value::UBigInt(u) => Json::from(u),
        Value::Float(f) => float_to_json(f as f64),
        Value::Double(f) => float_to_json(f),
        Value::Decimal(d) => {
            let text = d.to_string();
            match text.parse::<f64>() {
                Ok(f) if f.is_finite() => float_to_json(f),
                _ => Json::String(text),
            }
        }
        Value::Text(s) => Json::String(s),
        Value::Enum(s) => Json::String(s),
        Value::Date32(days) => date_to_json(days),
        Value::Timestamp(unit, v) => timestamp_to_json(unit, v),
        Value::Time64(unit, v) => time_to_json(unit, v),
        Value::Interval {
            months,
            days,
            nanos,
        } => Json::String(interval_to_string(months, days, nanos)),
        Value::Blob(bytes) => Json::String(format!("\\x{}", hex::encode(bytes))),
        Value::List(items) | Value::Array(items) => {
            Json::Array(items.into_iter().map(value_to_json).collect())
        }
        Value::Struct(fields) => Json::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v.clone())))
                .collect(),
        ),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (map_key(k.clone()), value_to_json(v.clone())))
                .collect(),
        ),
        Value::Union(inner) => value_to_json(*inner),
        other => Json::String(format!("{:?}", other)),
    }
}

/// JSON object keys must be strings; text keys are kept as-is.
fn map_key(key: Value) -> String {
    match value_to_json(key) {
        Json::String(s) => s,
        other => other.to_string(),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n.abs() == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// DuckDB-style interval text, e.g. `1 year 2 months 3 days 04:05:06`.
pub fn interval_to_string(months: i32, days: i32, nanos: i64) -> String {
    let mut parts = Vec::new();
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        parts.push(plural(years as i64, "year"));
    }
    if months != 0 {
        parts.push(plural(months as i64, "month"));
    }
    if days != 0 {
        parts.push(plural(days as i64, "day"));
    }

    if nanos != 0 || parts.is_empty() {
        let sign = if nanos < 0 { "-" } else { "" };
        let micros = (nanos / 1_000).unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3_600,
            (secs / 60) % 60,
            secs % 60
        );
        if frac != 0 {
            time.push_str(&format!(".{:06}", frac));
        }
        parts.push(time);
    }

    parts.join(" ")
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date_to_json(days: i32) -> Json {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(|d| Json::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or_else(|| Json::String(days.to_string()))
}

fn timestamp_to_json(unit: TimeUnit, v: i64) -> Json {
    match DateTime::from_timestamp_micros(to_micros(unit, v)) {
        Some(ts) => Json::String(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        None => Json::String(v.to_string()),
    }
}

fn time_to_json(unit: TimeUnit, v: i64) -> Json {
    let micros = to_micros(unit, v);
    let secs = micros.div_euclid(1_000_000);
    let nanos = micros.rem_euclid(1_000_000) * 1_000;
    match NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, nanos as u32) {
        Some(t) => Json::String(t.format("%H:%M:%S%.f").to_string()),
        None => Json::String(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::types::OrderedMap;
    use serde_json::json;

    #[test]
    fn test_non_finite_floats_become_null() {
        assert_eq!(value_to_json(Value::Double(f64::NAN)), Json::Null);
        assert_eq!(value_to_json(Value::Double(f64::INFINITY)), Json::Null);
        assert_eq!(value_to_json(Value::Double(f64::NEG_INFINITY)), Json::Null);
        assert_eq!(value_to_json(Value::Float(f32::NAN)), Json::Null);
        assert_eq!(value_to_json(Value::Double(2.5)), json!(2.5));
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(value_to_json(Value::BigInt(42)), json!(42));
        assert_eq!(value_to_json(Value::Boolean(true)), json!(true));
        assert_eq!(value_to_json(Value::Text("shipped".into())), json!("shipped"));
        assert_eq!(value_to_json(Value::Null), Json::Null);
        assert_eq!(value_to_json(Value::HugeInt(7)), json!(7));
        assert_eq!(
            value_to_json(Value::HugeInt(i128::MAX)),
            json!(i128::MAX.to_string())
        );
    }

    #[test]
    fn test_temporal_values_are_stringified() {
        assert_eq!(value_to_json(Value::Date32(0)), json!("1970-01-01"));
        assert_eq!(value_to_json(Value::Date32(19_723)), json!("2024-01-01"));
        assert_eq!(
            value_to_json(Value::Timestamp(TimeUnit::Second, 86_400)),
            json!("1970-01-02 00:00:00")
        );
        assert_eq!(
            value_to_json(Value::Time64(TimeUnit::Microsecond, 3_600_000_000)),
            json!("01:00:00")
        );
    }

    #[test]
    fn test_nested_lists_are_sanitized() {
        let list = Value::List(vec![Value::Double(1.0), Value::Double(f64::NAN)]);
        assert_eq!(value_to_json(list), json!([1.0, null]));
    }

    #[test]
    fn test_intervals_are_readable() {
        let three_days = Value::Interval { months: 0, days: 3, nanos: 0 };
        assert_eq!(value_to_json(three_days), json!("3 days"));
        assert_eq!(interval_to_string(14, 1, 0), "1 year 2 months 1 day");
        assert_eq!(interval_to_string(0, 0, 3_723_000_000_000), "01:02:03");
        assert_eq!(interval_to_string(0, 2, 1_500_000_000), "2 days 00:00:01.500000");
        assert_eq!(interval_to_string(0, 0, 0), "00:00:00");
    }

    #[test]
    fn test_structs_and_maps_become_objects() {
        let record = Value::Struct(OrderedMap::from(vec![
            ("name".to_string(), Value::Text("x".into())),
            ("score".to_string(), Value::Double(f64::NAN)),
            (
                "tags".to_string(),
                Value::List(vec![Value::Double(f64::INFINITY), Value::Int(2)]),
            ),
        ]));
        assert_eq!(
            value_to_json(record),
            json!({"name": "x", "score": null, "tags": [null, 2]})
        );

        let map = Value::Map(OrderedMap::from(vec![
            (Value::Text("a".into()), Value::Int(1)),
            (Value::Int(7), Value::Double(f64::NAN)),
        ]));
        assert_eq!(value_to_json(map), json!({"a": 1, "7": null}));
    }

    #[test]
    fn test_blob_union_and_decimal() {
        assert_eq!(value_to_json(Value::Blob(vec![0xde, 0xad])), json!("\\xdead"));
        assert_eq!(
            value_to_json(Value::Union(Box::new(Value::Text("u".into())))),
            json!("u")
        );
        let decimal = duckdb::types::Decimal::new(2, 1, 25).unwrap();
        assert_eq!(value_to_json(Value::Decimal(decimal)), json!(2.5));
    }

    #[test]
    fn test_failed_outcome_serializes_as_error_object() {
        let outcome = QueryOutcome::Failed { error: "boom".to_string() };
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!({"error": "boom"}));
        assert!(outcome.is_failed());
    }
}
