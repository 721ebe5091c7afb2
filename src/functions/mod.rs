//! Named transform functions and the registry the interpreters resolve them through.
//!
//! Record-mode functions take the resolved source value and return a [`FieldOutput`]: a
//! single scalar stored under the entry's destination name, or a map of fields spread into the
//! output record. Table-mode functions take the whole [`DataSet`] plus their compiled
//! [`TableParams`] and return a [`TableOutput`].
//!
//! Names are resolved once, when a spec is compiled into a transformer, so an unknown name
//! fails at load time rather than on the first record.

pub mod aggregate;
pub mod chat;
pub mod contact;
pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{FunctionKind, TransformError, TransformResult};
use crate::processing::{Filter, ReduceOp};
use crate::spec::TransformEntry;
use crate::types::{DataSet, DataType, Metadata, TimeUnit, Value};

/// Result of a record-mode function.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutput {
    /// Stored under the entry's `name`.
    Scalar(serde_json::Value),
    /// Spread into the output record (later entries win on key collision).
    Fields(serde_json::Map<String, serde_json::Value>),
}

impl FieldOutput {
    /// Classify a raw value: objects spread, everything else is a scalar.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => Self::Fields(map),
            other => Self::Scalar(other),
        }
    }
}

/// Result of a table-mode function.
#[derive(Debug, Clone, PartialEq)]
pub enum TableOutput {
    /// One value per row.
    Column { data_type: DataType, values: Vec<Value> },
    /// A single value (repeated down the column in column mode).
    Scalar(Value),
    /// Several named values (metadata mode only).
    Fields(Metadata),
}

pub type RecordFn = Arc<dyn Fn(&serde_json::Value) -> TransformResult<FieldOutput> + Send + Sync>;
pub type TableFn = Arc<dyn Fn(&DataSet, &TableParams) -> TransformResult<TableOutput> + Send + Sync>;
pub type PostFn = Arc<dyn Fn(Value, &serde_json::Value) -> TransformResult<Value> + Send + Sync>;

/// A registered table function and the parameters it cannot run without.
#[derive(Clone)]
pub struct TableFunction {
    pub handler: TableFn,
    pub required_params: Vec<&'static str>,
}

/// One configured aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    /// Name as written in the config; used to prefix fan-out keys.
    pub name: String,
    pub op: ReduceOp,
}

/// `aggregator: mean` versus `aggregator: [mean, max]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregators {
    Single(Aggregator),
    Many(Vec<Aggregator>),
}

/// A resolved `post_operator: {name, args}` hook.
#[derive(Clone)]
pub struct PostOperator {
    pub name: String,
    pub func: PostFn,
    pub args: serde_json::Value,
}

impl PostOperator {
    pub fn apply(&self, value: Value) -> TransformResult<Value> {
        (self.func)(value, &self.args)
    }
}

impl fmt::Debug for PostOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostOperator")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}

/// Compiled parameter block of a tabular spec entry.
#[derive(Debug, Clone)]
pub struct TableParams {
    /// Function name (the entry key).
    pub transform: String,
    /// Destination column or metadata key.
    pub output: String,
    /// Column read by per-row string functions (`str_length`, `word_count`).
    pub column_name: Option<String>,
    /// Column read by `column_operator`.
    pub column: Option<String>,
    pub filters: Vec<Filter>,
    pub aggregators: Option<Aggregators>,
    pub post_operator: Option<PostOperator>,
    /// Unit for elapsed-time results; `unit:` in the config, minutes by default.
    pub unit: TimeUnit,
}

impl TableParams {
    /// Validate and resolve an entry's parameters against `registry`.
    pub fn compile(
        entry: &TransformEntry,
        function: &TableFunction,
        registry: &FunctionRegistry,
    ) -> TransformResult<Self> {
        for key in &function.required_params {
            if !entry.items.contains_key(*key) {
                return Err(TransformError::MissingParameter {
                    transform: entry.name.clone(),
                    key: (*key).to_string(),
                });
            }
        }

        let filters = match entry.items.get("filters") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => {
                items.iter().map(Filter::from_json).collect::<TransformResult<_>>()?
            }
            Some(other) => {
                return Err(TransformError::config(format!(
                    "entry '{}': filters must be a list, got {other}",
                    entry.name
                )));
            }
        };

        let aggregators = match entry.items.get("aggregator") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(name)) => Some(Aggregators::Single(aggregator(name)?)),
            Some(serde_json::Value::Array(names)) => {
                let mut out = Vec::with_capacity(names.len());
                for name in names {
                    let name = name.as_str().ok_or_else(|| {
                        TransformError::config(format!(
                            "entry '{}': aggregator names must be strings",
                            entry.name
                        ))
                    })?;
                    out.push(aggregator(name)?);
                }
                Some(Aggregators::Many(out))
            }
            Some(other) => {
                return Err(TransformError::config(format!(
                    "entry '{}': aggregator must be a name or list of names, got {other}",
                    entry.name
                )));
            }
        };

        let post_operator = match entry.items.get("post_operator") {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::Object(post)) => {
                let name = post.get("name").and_then(|n| n.as_str()).ok_or_else(|| {
                    TransformError::MissingParameter {
                        transform: entry.name.clone(),
                        key: "post_operator.name".to_string(),
                    }
                })?;
                Some(PostOperator {
                    name: name.to_string(),
                    func: registry.post_operator(name)?,
                    args: post.get("args").cloned().unwrap_or(serde_json::Value::Null),
                })
            }
            Some(other) => {
                return Err(TransformError::config(format!(
                    "entry '{}': post_operator must be a mapping, got {other}",
                    entry.name
                )));
            }
        };

        let unit = match entry.str_param("unit")? {
            None => TimeUnit::Minutes,
            Some(code) => TimeUnit::from_code(code).ok_or_else(|| {
                TransformError::config(format!("entry '{}': unknown time unit '{code}'", entry.name))
            })?,
        };

        Ok(Self {
            transform: entry.name.clone(),
            output: entry.require_str("output")?.to_string(),
            column_name: entry.str_param("column_name")?.map(str::to_string),
            column: entry.str_param("column")?.map(str::to_string),
            filters,
            aggregators,
            post_operator,
            unit,
        })
    }

    pub(crate) fn require_column_name(&self) -> TransformResult<&str> {
        self.column_name.as_deref().ok_or_else(|| self.missing("column_name"))
    }

    pub(crate) fn require_column(&self) -> TransformResult<&str> {
        self.column.as_deref().ok_or_else(|| self.missing("column"))
    }

    pub(crate) fn require_aggregators(&self) -> TransformResult<&Aggregators> {
        self.aggregators.as_ref().ok_or_else(|| self.missing("aggregator"))
    }

    fn missing(&self, key: &str) -> TransformError {
        TransformError::MissingParameter {
            transform: self.transform.clone(),
            key: key.to_string(),
        }
    }
}

fn aggregator(name: &str) -> TransformResult<Aggregator> {
    let op = ReduceOp::from_name(name).ok_or_else(|| TransformError::UnknownFunction {
        kind: FunctionKind::Aggregator,
        name: name.to_string(),
    })?;
    Ok(Aggregator {
        name: name.to_string(),
        op,
    })
}

/// Name → function lookup for both interpreter modes.
///
/// [`FunctionRegistry::builtin`] holds the standard library; [`FunctionRegistry::new`] starts
/// empty so tests and callers can register their own handlers.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    record: HashMap<String, RecordFn>,
    table: HashMap<String, TableFunction>,
    post: HashMap<String, PostFn>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in function.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        text::register(&mut registry);
        contact::register(&mut registry);
        chat::register(&mut registry);
        aggregate::register(&mut registry);
        registry
    }

    pub fn register_record<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&serde_json::Value) -> TransformResult<FieldOutput> + Send + Sync + 'static,
    {
        self.record.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn register_table<F>(&mut self, name: &str, required_params: &[&'static str], f: F) -> &mut Self
    where
        F: Fn(&DataSet, &TableParams) -> TransformResult<TableOutput> + Send + Sync + 'static,
    {
        self.table.insert(
            name.to_string(),
            TableFunction {
                handler: Arc::new(f),
                required_params: required_params.to_vec(),
            },
        );
        self
    }

    pub fn register_post<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(Value, &serde_json::Value) -> TransformResult<Value> + Send + Sync + 'static,
    {
        self.post.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn record(&self, name: &str) -> TransformResult<RecordFn> {
        self.record
            .get(name)
            .cloned()
            .ok_or_else(|| unknown(FunctionKind::Record, name))
    }

    pub fn table(&self, name: &str) -> TransformResult<TableFunction> {
        self.table
            .get(name)
            .cloned()
            .ok_or_else(|| unknown(FunctionKind::Table, name))
    }

    pub fn post_operator(&self, name: &str) -> TransformResult<PostFn> {
        self.post
            .get(name)
            .cloned()
            .ok_or_else(|| unknown(FunctionKind::PostOperator, name))
    }

    /// Sorted names of registered record functions.
    pub fn record_names(&self) -> Vec<&str> {
        sorted_keys(&self.record)
    }

    /// Sorted names of registered table functions.
    pub fn table_names(&self) -> Vec<&str> {
        sorted_keys(&self.table)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("record", &self.record_names())
            .field("table", &self.table_names())
            .field("post", &sorted_keys(&self.post))
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

fn unknown(kind: FunctionKind, name: &str) -> TransformError {
    TransformError::UnknownFunction {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Aggregators, FieldOutput, FunctionRegistry, TableParams};
    use crate::error::{FunctionKind, TransformError};
    use crate::processing::ReduceOp;
    use crate::spec::TransformSpec;
    use crate::types::TimeUnit;
    use serde_json::json;

    fn compile(meta: serde_json::Value) -> Result<TableParams, TransformError> {
        let registry = FunctionRegistry::builtin();
        let spec = TransformSpec::from_meta(&[meta]).unwrap();
        let entry = &spec.entries()[0];
        let function = registry.table(&entry.name)?;
        TableParams::compile(entry, &function, &registry)
    }

    #[test]
    fn builtin_registers_both_modes() {
        let registry = FunctionRegistry::builtin();
        for name in ["parse_handlers", "parse_messages", "parse_html", "clean_text", "distress_score"] {
            assert!(registry.record(name).is_ok(), "{name}");
        }
        for name in [
            "convo_start_indicator",
            "convo_indicator",
            "calc_wait_time",
            "calc_handle_time",
            "calc_response_time",
            "calc_message_sequence",
            "str_length",
            "word_count",
            "row_count",
            "column_operator",
        ] {
            assert!(registry.table(name).is_ok(), "{name}");
        }
        assert!(registry.post_operator("convert_timedelta").is_ok());
    }

    #[test]
    fn unknown_names_are_lookup_errors() {
        let registry = FunctionRegistry::builtin();
        let err = registry.record("nope").err().unwrap();
        assert!(matches!(
            err,
            TransformError::UnknownFunction {
                kind: FunctionKind::Record,
                ..
            }
        ));
    }

    #[test]
    fn custom_registration_is_visible() {
        let mut registry = FunctionRegistry::new();
        registry.register_record("upper", |v| {
            Ok(FieldOutput::Scalar(json!(v.as_str().unwrap_or_default().to_uppercase())))
        });
        let f = registry.record("upper").unwrap();
        assert_eq!(f(&json!("abc")).unwrap(), FieldOutput::Scalar(json!("ABC")));
        assert_eq!(registry.record_names(), vec!["upper"]);
    }

    #[test]
    fn compiles_aggregator_list_and_post_operator() {
        let params = compile(json!({"column_operator": {
            "output": "khp_response_time",
            "column": "response_time",
            "aggregator": ["mean", "max"],
            "post_operator": {"name": "convert_timedelta", "args": "s"},
            "unit": "h"
        }}))
        .unwrap();
        match params.aggregators.unwrap() {
            Aggregators::Many(aggs) => {
                assert_eq!(aggs.len(), 2);
                assert_eq!(aggs[1].op, ReduceOp::Max);
            }
            other => panic!("expected list, got {other:?}"),
        }
        assert_eq!(params.post_operator.unwrap().name, "convert_timedelta");
        assert_eq!(params.unit, TimeUnit::Hours);
    }

    #[test]
    fn compile_fails_fast_on_missing_required_parameter() {
        let err = compile(json!({"word_count": {"output": "words"}})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter 'column_name'"));
        let err = compile(json!({"row_count": {"filters": []}})).unwrap_err();
        assert!(err.to_string().contains("'output'"));
    }

    #[test]
    fn compile_fails_fast_on_unknown_aggregator_and_post_operator() {
        let err = compile(json!({"column_operator": {
            "output": "x", "column": "y", "aggregator": "mode"
        }}))
        .unwrap_err();
        assert!(matches!(
            err,
            TransformError::UnknownFunction {
                kind: FunctionKind::Aggregator,
                ..
            }
        ));
        let err = compile(json!({"column_operator": {
            "output": "x", "column": "y", "aggregator": "mean", "post_operator": {"name": "explode"}
        }}))
        .unwrap_err();
        assert!(matches!(
            err,
            TransformError::UnknownFunction {
                kind: FunctionKind::PostOperator,
                ..
            }
        ));
    }

    #[test]
    fn compile_rejects_bad_unit() {
        let err = compile(json!({"calc_wait_time": {"output": "wait", "unit": "fortnight"}})).unwrap_err();
        assert!(err.to_string().contains("unknown time unit"));
    }
}
