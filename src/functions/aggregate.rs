//! Filtered counting and column aggregation, plus post-processing hooks.

use super::{Aggregators, FunctionRegistry, TableOutput, TableParams};
use crate::error::{TransformError, TransformResult};
use crate::processing::{apply_filters, reduce};
use crate::types::{DataSet, Metadata, TimeUnit, Value};

fn filtered(table: &DataSet, params: &TableParams) -> TransformResult<DataSet> {
    if params.filters.is_empty() {
        Ok(table.clone())
    } else {
        apply_filters(table, &params.filters)
    }
}

/// Number of rows, after `filters` if any.
pub fn row_count(table: &DataSet, params: &TableParams) -> TransformResult<TableOutput> {
    let count = if params.filters.is_empty() {
        table.row_count()
    } else {
        apply_filters(table, &params.filters)?.row_count()
    };
    Ok(TableOutput::Scalar(Value::Int64(count as i64)))
}

/// Aggregate `column` (after `filters`) with one or more aggregators.
///
/// A single aggregator yields a scalar. A list yields fields named `{aggregator}_{output}`.
/// The post-operator, when configured, is applied to every aggregate. Aggregating an empty
/// row set gives null.
pub fn column_operator(table: &DataSet, params: &TableParams) -> TransformResult<TableOutput> {
    let column = params.require_column()?;
    let aggregators = params.require_aggregators()?;
    let rows = filtered(table, params)?;

    let aggregate = |op| -> TransformResult<Value> {
        let value = reduce(&rows, column, op).ok_or_else(|| TransformError::MissingColumn {
            column: column.to_string(),
        })?;
        match &params.post_operator {
            Some(post) => post.apply(value),
            None => Ok(value),
        }
    };

    match aggregators {
        Aggregators::Single(agg) => Ok(TableOutput::Scalar(aggregate(agg.op)?)),
        Aggregators::Many(aggs) => {
            let mut out = Metadata::new();
            for agg in aggs {
                out.insert(format!("{}_{}", agg.name, params.output), aggregate(agg.op)?);
            }
            Ok(TableOutput::Fields(out))
        }
    }
}

/// Express a duration as a float in the unit named by `args` (`"m"` or `["m"]`).
pub fn convert_timedelta(value: Value, args: &serde_json::Value) -> TransformResult<Value> {
    let code = match args {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Array(items) => items.first().and_then(|v| v.as_str()),
        _ => None,
    }
    .ok_or_else(|| {
        TransformError::invalid_input("convert_timedelta", format!("args must name a time unit, got {args}"))
    })?;
    let unit = TimeUnit::from_code(code)
        .ok_or_else(|| TransformError::invalid_input("convert_timedelta", format!("unknown time unit '{code}'")))?;
    match value {
        Value::Null => Ok(Value::Null),
        Value::Duration(d) => Ok(Value::Float64(unit.convert(d))),
        other => Err(TransformError::invalid_input(
            "convert_timedelta",
            format!("expected a duration, got {other:?}"),
        )),
    }
}

/// Round a numeric value to `args` decimal places (default 0).
pub fn round(value: Value, args: &serde_json::Value) -> TransformResult<Value> {
    let digits = match args {
        serde_json::Value::Null => 0,
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        serde_json::Value::Array(items) => items.first().and_then(|v| v.as_i64()).unwrap_or(0),
        other => {
            return Err(TransformError::invalid_input("round", format!("args must be a digit count, got {other}")));
        }
    };
    let factor = 10f64.powi(digits.clamp(-15, 15) as i32);
    match value {
        Value::Null => Ok(Value::Null),
        v => v
            .as_f64()
            .map(|f| Value::Float64((f * factor).round() / factor))
            .ok_or_else(|| TransformError::invalid_input("round", format!("expected a number, got {v:?}"))),
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry
        .register_table("row_count", &[], row_count)
        .register_table("column_operator", &["column", "aggregator"], column_operator)
        .register_post("convert_timedelta", convert_timedelta)
        .register_post("round", round);
}
