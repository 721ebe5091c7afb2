//! Reduction operations for [`crate::types::DataSet`].

use chrono::TimeDelta;

use crate::types::{duration_nanos, DataSet, DataType, Value};

/// Built-in reduction operations over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Count all rows (including nulls).
    Count,
    /// Sum values, ignoring nulls.
    Sum,
    /// Minimum value, ignoring nulls.
    Min,
    /// Maximum value, ignoring nulls.
    Max,
    /// Arithmetic mean, ignoring nulls.
    Mean,
    /// Median, ignoring nulls.
    Median,
    /// Population standard deviation, ignoring nulls.
    Std,
}

impl ReduceOp {
    /// Parse an aggregator name as written in transform configs.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "mean" => Some(Self::Mean),
            "median" => Some(Self::Median),
            "std" => Some(Self::Std),
            _ => None,
        }
    }
}

/// Reduce a column using a built-in [`ReduceOp`].
///
/// - Returns `None` if `column` does not exist in the schema.
/// - For every op except `Count`, returns `Some(Value::Null)` if there are no non-null values
///   (an empty or fully filtered table aggregates to null rather than NaN).
/// - For `Count`, always returns `Some(Value::Int64(row_count))`.
/// - Integer columns keep their type for `Sum`/`Min`/`Max`; `Mean`/`Median`/`Std` are floats.
/// - Duration columns reduce to durations; timestamp columns support only `Min`/`Max`.
pub fn reduce(dataset: &DataSet, column: &str, op: ReduceOp) -> Option<Value> {
    let idx = dataset.schema.index_of(column)?;

    if op == ReduceOp::Count {
        return Some(Value::Int64(dataset.row_count() as i64));
    }

    let cells = dataset.rows.iter().filter_map(|row| row.get(idx));
    let data_type = dataset.schema.fields.get(idx)?.data_type.clone();
    Some(match data_type {
        DataType::Int64 => {
            let values: Vec<i64> = cells.filter_map(Value::as_i64).collect();
            match op {
                ReduceOp::Sum if !values.is_empty() => match values
                    .iter()
                    .try_fold(0i64, |acc, v| acc.checked_add(*v))
                {
                    Some(total) => Value::Int64(total),
                    // overflow: fall back to a float sum
                    None => Value::Float64(values.iter().map(|v| *v as f64).sum()),
                },
                ReduceOp::Min => values.iter().min().copied().map(Value::Int64).unwrap_or(Value::Null),
                ReduceOp::Max => values.iter().max().copied().map(Value::Int64).unwrap_or(Value::Null),
                _ => {
                    let floats: Vec<f64> = values.iter().map(|v| *v as f64).collect();
                    reduce_f64(&floats, op).map(Value::Float64).unwrap_or(Value::Null)
                }
            }
        }
        DataType::Float64 => {
            let values: Vec<f64> = cells.filter_map(Value::as_f64).collect();
            reduce_f64(&values, op).map(Value::Float64).unwrap_or(Value::Null)
        }
        DataType::Duration => {
            let values: Vec<f64> = cells
                .filter_map(|v| match v {
                    Value::Duration(d) => Some(duration_nanos(*d)),
                    _ => None,
                })
                .collect();
            reduce_f64(&values, op)
                .map(|nanos| Value::Duration(TimeDelta::nanoseconds(nanos.round() as i64)))
                .unwrap_or(Value::Null)
        }
        DataType::Timestamp => {
            let values = cells.filter_map(Value::as_timestamp);
            match op {
                ReduceOp::Min => values.min().map(Value::Timestamp).unwrap_or(Value::Null),
                ReduceOp::Max => values.max().map(Value::Timestamp).unwrap_or(Value::Null),
                _ => Value::Null,
            }
        }
        DataType::Bool | DataType::Utf8 => Value::Null,
    })
}

fn reduce_f64(values: &[f64], op: ReduceOp) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    match op {
        ReduceOp::Count => Some(n),
        ReduceOp::Sum => Some(values.iter().sum()),
        ReduceOp::Min => values.iter().copied().reduce(f64::min),
        ReduceOp::Max => values.iter().copied().reduce(f64::max),
        ReduceOp::Mean => Some(values.iter().sum::<f64>() / n),
        ReduceOp::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                Some((sorted[mid - 1] + sorted[mid]) / 2.0)
            } else {
                Some(sorted[mid])
            }
        }
        ReduceOp::Std => {
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            Some(var.sqrt())
        }
    }
}
