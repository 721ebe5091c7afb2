//! JSON ingestion for vendor exports.
//!
//! Supported inputs:
//! - A JSON array of objects (contacts files): `[{"ContactID":1}, {"ContactID":2}]`
//! - A single JSON object (transcript files)
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n`
//!
//! Remapped chat messages are turned into a typed message table by [`messages_table`].

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};

use crate::error::{TransformError, TransformResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Read one JSON document from a file.
pub fn read_json_path(path: impl AsRef<Path>) -> TransformResult<serde_json::Value> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Read a file of records (array, single object or NDJSON).
pub fn read_records_path(path: impl AsRef<Path>) -> TransformResult<Vec<serde_json::Value>> {
    let text = fs::read_to_string(path)?;
    records_from_str(&text)
}

/// Parse records from an in-memory string.
pub fn records_from_str(input: &str) -> TransformResult<Vec<serde_json::Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TransformError::config("json input is empty"));
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        match v {
            serde_json::Value::Array(items) => Ok(items),
            serde_json::Value::Object(_) => Ok(vec![v]),
            _ => Err(TransformError::config(
                "json must be an object, an array of objects, or NDJSON",
            )),
        }
    } else {
        // Fall back to NDJSON.
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<serde_json::Value>(line).map_err(|e| {
                TransformError::config(format!("invalid ndjson at line {}: {}", i + 1, e))
            })?;
            values.push(v);
        }
        Ok(values)
    }
}

/// Schema of the message table built from remapped chat messages.
pub fn message_schema() -> Schema {
    Schema::new(vec![
        Field::new("sender", DataType::Utf8),
        Field::new("dt", DataType::Timestamp),
        Field::new("message_type", DataType::Int64),
        Field::new("message", DataType::Utf8),
        Field::new("contact_id", DataType::Int64),
        Field::new("display_name", DataType::Utf8),
    ])
}

/// Build the message table from remapped messages (see
/// [`crate::functions::text::parse_messages`]). Absent fields load as null.
pub fn messages_table(messages: &[serde_json::Value]) -> TransformResult<DataSet> {
    let schema = message_schema();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(messages.len());

    for (idx0, v) in messages.iter().enumerate() {
        let row_num = idx0 + 1;
        let obj = v.as_object().ok_or_else(|| TransformError::ParseError {
            row: row_num,
            column: String::new(),
            raw: v.to_string(),
            message: "message is not a json object".to_string(),
        })?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for field in &schema.fields {
            row.push(match obj.get(&field.name) {
                None => Value::Null,
                Some(jv) => convert_json_value(row_num, &field.name, &field.data_type, jv)?,
            });
        }
        rows.push(row);
    }

    Ok(DataSet::new(schema, rows))
}

/// Parse the timestamp formats seen in vendor payloads.
///
/// Accepts RFC 3339 (converted to UTC), naive `YYYY-mm-ddTHH:MM:SS[.f]` /
/// `YYYY-mm-dd HH:MM:SS[.f]`, and `/Date(<epoch ms>[+zone])/`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Some(inner) = raw.strip_prefix("/Date(").and_then(|s| s.strip_suffix(")/")) {
        let digits_end = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map(|(i, _)| i)
            .unwrap_or(inner.len());
        let millis: i64 = inner[..digits_end].parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn convert_json_value(
    row: usize,
    column: &str,
    data_type: &DataType,
    v: &serde_json::Value,
) -> TransformResult<Value> {
    if v.is_null() {
        return Ok(Value::Null);
    }

    let err = |message: &str| TransformError::ParseError {
        row,
        column: column.to_string(),
        raw: v.to_string(),
        message: message.to_string(),
    };

    match data_type {
        DataType::Utf8 => match v {
            serde_json::Value::String(s) => Ok(Value::Utf8(s.clone())),
            serde_json::Value::Number(n) => Ok(Value::Utf8(n.to_string())),
            _ => Err(err("expected string")),
        },
        DataType::Bool => v.as_bool().map(Value::Bool).ok_or_else(|| err("expected bool")),
        DataType::Int64 => {
            if let Some(n) = v.as_i64() {
                Ok(Value::Int64(n))
            } else if let Some(s) = v.as_str() {
                s.trim().parse().map(Value::Int64).map_err(|_| err("expected integer"))
            } else {
                Err(err("expected integer number"))
            }
        }
        DataType::Float64 => v.as_f64().map(Value::Float64).ok_or_else(|| err("expected number")),
        DataType::Timestamp => match v {
            serde_json::Value::String(s) => parse_timestamp(s)
                .map(Value::Timestamp)
                .ok_or_else(|| err("unrecognised timestamp")),
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| Value::Timestamp(dt.naive_utc()))
                .ok_or_else(|| err("expected epoch milliseconds")),
            _ => Err(err("expected timestamp")),
        },
        DataType::Duration => Err(err("durations are derived, not ingested")),
    }
}

#[cfg(test)]
mod tests {
    use super::{messages_table, parse_timestamp, records_from_str};
    use crate::types::Value;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn records_from_array_object_and_ndjson() {
        assert_eq!(records_from_str(r#"[{"a":1},{"a":2}]"#).unwrap().len(), 2);
        assert_eq!(records_from_str(r#"{"a":1}"#).unwrap().len(), 1);
        assert_eq!(records_from_str("{\"a\":1}\n\n{\"a\":2}\n").unwrap().len(), 2);
        assert_eq!(records_from_str("[]").unwrap().len(), 0);
        assert!(records_from_str("   ").is_err());
        assert!(records_from_str("42").is_err());
    }

    #[test]
    fn parses_vendor_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2018, 2, 10)
            .unwrap()
            .and_hms_milli_opt(15, 0, 1, 500)
            .unwrap();
        assert_eq!(parse_timestamp("2018-02-10T15:00:01.500Z"), Some(expected));
        assert_eq!(parse_timestamp("2018-02-10T10:00:01.500-05:00"), Some(expected));
        assert_eq!(parse_timestamp("2018-02-10T15:00:01.5"), Some(expected));
        assert_eq!(parse_timestamp("2018-02-10 15:00:01.500"), Some(expected));
        assert_eq!(parse_timestamp("/Date(1518274801500)/"), Some(expected));
        assert_eq!(parse_timestamp("/Date(1518274801500-0500)/"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn messages_table_types_columns_and_nulls_missing_fields() {
        let ds = messages_table(&[
            json!({"sender": "a", "dt": "2018-02-10T15:00:00Z", "message_type": 1, "message": "x"}),
            json!({"sender": "b", "dt": "2018-02-10T15:01:00Z", "message_type": "3", "message": null, "contact_id": 9}),
        ])
        .unwrap();
        assert_eq!(ds.row_count(), 2);
        let mt = ds.schema.index_of("message_type").unwrap();
        assert_eq!(ds.rows[1][mt], Value::Int64(3));
        let cid = ds.schema.index_of("contact_id").unwrap();
        assert_eq!(ds.rows[0][cid], Value::Null);
        assert!(matches!(ds.rows[0][ds.schema.index_of("dt").unwrap()], Value::Timestamp(_)));
    }

    #[test]
    fn messages_table_rejects_bad_timestamp() {
        let err = messages_table(&[json!({"dt": "soon"})]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed to parse value"));
        assert!(msg.contains("column 'dt'"));
    }
}
