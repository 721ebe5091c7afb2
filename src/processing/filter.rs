//! Row filtering for [`crate::types::DataSet`].

use std::cmp::Ordering;

use crate::error::{TransformError, TransformResult};
use crate::types::{DataSet, Value};

/// Returns a new [`DataSet`] containing only rows for which `predicate` returns `true`.
///
/// This is a convenience wrapper around [`DataSet::filter_rows`].
pub fn filter<F>(dataset: &DataSet, predicate: F) -> DataSet
where
    F: FnMut(&[Value]) -> bool,
{
    dataset.filter_rows(predicate)
}

/// Comparison operators available to configured filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Parse an operator name (`eq`, `ne`, `lt`, `le`, `gt`, `ge`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "le" => Some(Self::Le),
            "gt" => Some(Self::Gt),
            "ge" => Some(Self::Ge),
            _ => None,
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
        }
    }
}

/// One `{column, operator, value, value_type}` filter from a transform config.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Filter {
    /// Parse a filter mapping. `value_type` is required and is one of `int`, `float`, `str`,
    /// `bool`; the value is coerced to it here.
    pub fn from_json(v: &serde_json::Value) -> TransformResult<Self> {
        let obj = v
            .as_object()
            .ok_or_else(|| TransformError::config(format!("filter must be a mapping, got {v}")))?;
        let field = |key: &str| {
            obj.get(key)
                .ok_or_else(|| TransformError::config(format!("filter is missing '{key}': {v}")))
        };

        let column = field("column")?
            .as_str()
            .ok_or_else(|| TransformError::config("filter 'column' must be a string"))?
            .to_string();
        let op_name = field("operator")?
            .as_str()
            .ok_or_else(|| TransformError::config("filter 'operator' must be a string"))?;
        let op = CompareOp::from_name(op_name)
            .ok_or_else(|| TransformError::config(format!("unknown filter operator '{op_name}'")))?;
        let raw = field("value")?;
        let value_type = field("value_type")?
            .as_str()
            .ok_or_else(|| TransformError::config("filter 'value_type' must be a string"))?;
        let value = coerce(raw, value_type)?;

        Ok(Self { column, op, value })
    }

    /// Whether a single cell satisfies this filter. Nulls never match.
    pub fn matches(&self, cell: &Value) -> bool {
        cell.compare(&self.value)
            .map(|ord| self.op.accepts(ord))
            .unwrap_or(false)
    }
}

/// Keep rows that satisfy every filter.
pub fn apply_filters(dataset: &DataSet, filters: &[Filter]) -> TransformResult<DataSet> {
    let mut idxs = Vec::with_capacity(filters.len());
    for f in filters {
        let idx = dataset
            .schema
            .index_of(&f.column)
            .ok_or_else(|| TransformError::MissingColumn {
                column: f.column.clone(),
            })?;
        idxs.push(idx);
    }
    Ok(filter(dataset, |row| {
        filters.iter().zip(&idxs).all(|(f, &idx)| f.matches(&row[idx]))
    }))
}

fn coerce(raw: &serde_json::Value, value_type: &str) -> TransformResult<Value> {
    let bad = || TransformError::config(format!("cannot coerce filter value {raw} to {value_type}"));
    match value_type {
        "int" => match raw {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(Value::Int64)
                .ok_or_else(bad),
            serde_json::Value::String(s) => s.trim().parse().map(Value::Int64).map_err(|_| bad()),
            serde_json::Value::Bool(b) => Ok(Value::Int64(i64::from(*b))),
            _ => Err(bad()),
        },
        "float" => match raw {
            serde_json::Value::Number(n) => n.as_f64().map(Value::Float64).ok_or_else(bad),
            serde_json::Value::String(s) => s.trim().parse().map(Value::Float64).map_err(|_| bad()),
            _ => Err(bad()),
        },
        "str" => match raw {
            serde_json::Value::String(s) => Ok(Value::Utf8(s.clone())),
            serde_json::Value::Null => Err(bad()),
            other => Ok(Value::Utf8(other.to_string())),
        },
        "bool" => match raw {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(bad()),
            },
            serde_json::Value::Number(n) => Ok(Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
            _ => Err(bad()),
        },
        _ => Err(TransformError::config(format!("unknown filter value_type '{value_type}'"))),
    }
}
