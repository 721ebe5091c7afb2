//! Per-transcript table functions.
//!
//! These run over a message table (one row per chat message) with at least `dt`,
//! `message_type` and `message` columns. `convo_start_indicator` and `convo_indicator` write
//! the indicator columns later functions read, so their entries must come first in the spec.

use std::sync::LazyLock;

use chrono::{NaiveDateTime, TimeDelta};
use regex::Regex;

use super::{FunctionRegistry, TableOutput, TableParams};
use crate::error::{TransformError, TransformResult};
use crate::types::{DataSet, DataType, Value};

pub const DT_COLUMN: &str = "dt";
pub const MESSAGE_TYPE_COLUMN: &str = "message_type";
pub const MESSAGE_COLUMN: &str = "message";
/// Column written by `convo_start_indicator`.
pub const CONVO_START_COLUMN: &str = "convo_start_ind";
/// Column written by `convo_indicator`.
pub const CONVO_COLUMN: &str = "convo_ind";

/// System-generated messages (joins, transfers, queue notices).
pub const SYSTEM_MESSAGE_TYPE: i64 = 1;
/// Message types exchanged between counsellor and visitor.
pub const CONVERSATION_MESSAGE_TYPES: [i64; 2] = [3, 4];

static JOINED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?:joined\sthe\s)|(?:sest\sjoint\s.\sla\s))conversation\.")
        .expect("joined pattern is valid")
});

fn indicator(values: impl Iterator<Item = bool>) -> TableOutput {
    TableOutput::Column {
        data_type: DataType::Int64,
        values: values.map(|b| Value::Int64(i64::from(b))).collect(),
    }
}

fn timestamps(table: &DataSet) -> TransformResult<Vec<Option<NaiveDateTime>>> {
    Ok(table.column(DT_COLUMN)?.into_iter().map(Value::as_timestamp).collect())
}

fn flagged(table: &DataSet, column: &str) -> TransformResult<Vec<bool>> {
    Ok(table
        .column(column)?
        .into_iter()
        .map(|v| v.as_i64() == Some(1))
        .collect())
}

/// 1 for system messages announcing that someone joined the conversation, else 0.
pub fn convo_start_indicator(table: &DataSet) -> TransformResult<TableOutput> {
    let types = table.column(MESSAGE_TYPE_COLUMN)?;
    let messages = table.column(MESSAGE_COLUMN)?;
    Ok(indicator(types.into_iter().zip(messages).map(|(t, m)| {
        t.as_i64() == Some(SYSTEM_MESSAGE_TYPE) && m.as_str().is_some_and(|text| JOINED.is_match(text))
    })))
}

/// 1 for conversation messages after the last join announcement, else 0.
///
/// A transcript with no join announcement has no live conversation: every row is 0.
pub fn convo_indicator(table: &DataSet) -> TransformResult<TableOutput> {
    let starts = flagged(table, CONVO_START_COLUMN)?;
    let last_start = starts.iter().rposition(|&s| s);
    let types = table.column(MESSAGE_TYPE_COLUMN)?;
    Ok(indicator(types.into_iter().enumerate().map(|(idx, t)| {
        let after_start = last_start.is_some_and(|start| idx > start);
        after_start && t.as_i64().is_some_and(|t| CONVERSATION_MESSAGE_TYPES.contains(&t))
    })))
}

fn convo_bounds(table: &DataSet) -> TransformResult<Option<(NaiveDateTime, NaiveDateTime)>> {
    let in_convo = flagged(table, CONVO_COLUMN)?;
    let times: Vec<NaiveDateTime> = timestamps(table)?
        .into_iter()
        .zip(in_convo)
        .filter_map(|(t, c)| if c { t } else { None })
        .collect();
    Ok(times.iter().min().copied().zip(times.iter().max().copied()))
}

fn elapsed(delta: Option<TimeDelta>, params: &TableParams) -> TableOutput {
    TableOutput::Scalar(
        delta
            .map(|d| Value::Float64(params.unit.convert(d)))
            .unwrap_or(Value::Null),
    )
}

/// Time from the first message of the transcript to the first conversation message.
///
/// Null when the transcript has no conversation messages.
pub fn calc_wait_time(table: &DataSet, params: &TableParams) -> TransformResult<TableOutput> {
    let start = timestamps(table)?.into_iter().flatten().min();
    let first_convo = convo_bounds(table)?.map(|(first, _)| first);
    Ok(elapsed(start.zip(first_convo).map(|(s, e)| e - s), params))
}

/// Time between the first and last conversation messages.
///
/// Null when the transcript has no conversation messages.
pub fn calc_handle_time(table: &DataSet, params: &TableParams) -> TransformResult<TableOutput> {
    let bounds = convo_bounds(table)?;
    Ok(elapsed(bounds.map(|(first, last)| last - first), params))
}

/// Per row: time since the previous message. The first row is its own predecessor.
pub fn calc_response_time(table: &DataSet) -> TransformResult<TableOutput> {
    let times = timestamps(table)?;
    let values = times
        .iter()
        .enumerate()
        .map(|(idx, current)| {
            let prev = if idx == 0 { current } else { &times[idx - 1] };
            match (current, prev) {
                (Some(c), Some(p)) => Value::Duration(*c - *p),
                _ => Value::Null,
            }
        })
        .collect();
    Ok(TableOutput::Column {
        data_type: DataType::Duration,
        values,
    })
}

/// Per row: `"{previous type}-{current type}"`. The first row is its own predecessor.
pub fn calc_message_sequence(table: &DataSet) -> TransformResult<TableOutput> {
    let types: Vec<Option<i64>> = table
        .column(MESSAGE_TYPE_COLUMN)?
        .into_iter()
        .map(Value::as_i64)
        .collect();
    let values = types
        .iter()
        .enumerate()
        .map(|(idx, current)| {
            let prev = if idx == 0 { current } else { &types[idx - 1] };
            match (prev, current) {
                (Some(p), Some(c)) => Value::Utf8(format!("{p}-{c}")),
                _ => Value::Null,
            }
        })
        .collect();
    Ok(TableOutput::Column {
        data_type: DataType::Utf8,
        values,
    })
}

fn text_column<'a>(table: &'a DataSet, params: &TableParams) -> TransformResult<Vec<&'a Value>> {
    let column = params.require_column_name()?;
    let values = table.column(column)?;
    if let Some(bad) = values.iter().find(|v| !v.is_null() && v.as_str().is_none()) {
        return Err(TransformError::invalid_input(
            &params.transform,
            format!("column '{column}' must hold text, found {bad:?}"),
        ));
    }
    Ok(values)
}

/// Per row: character count of `column_name`. Null text stays null.
pub fn str_length(table: &DataSet, params: &TableParams) -> TransformResult<TableOutput> {
    let values = text_column(table, params)?
        .into_iter()
        .map(|v| {
            v.as_str()
                .map(|s| Value::Int64(s.chars().count() as i64))
                .unwrap_or(Value::Null)
        })
        .collect();
    Ok(TableOutput::Column {
        data_type: DataType::Int64,
        values,
    })
}

/// Per row: whitespace-separated token count of `column_name`. Null text counts as empty.
pub fn word_count(table: &DataSet, params: &TableParams) -> TransformResult<TableOutput> {
    let values = text_column(table, params)?
        .into_iter()
        .map(|v| Value::Int64(v.as_str().unwrap_or("").split_whitespace().count() as i64))
        .collect();
    Ok(TableOutput::Column {
        data_type: DataType::Int64,
        values,
    })
}

pub(crate) fn register(registry: &mut FunctionRegistry) {
    registry
        .register_table("convo_start_indicator", &[], |t, _| convo_start_indicator(t))
        .register_table("convo_indicator", &[], |t, _| convo_indicator(t))
        .register_table("calc_wait_time", &[], calc_wait_time)
        .register_table("calc_handle_time", &[], calc_handle_time)
        .register_table("calc_response_time", &[], |t, _| calc_response_time(t))
        .register_table("calc_message_sequence", &[], |t, _| calc_message_sequence(t))
        .register_table("str_length", &["column_name"], str_length)
        .register_table("word_count", &["column_name"], word_count);
}
