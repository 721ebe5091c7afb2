//! Tabular interpretation over a message table.

use crate::error::{TransformError, TransformResult};
use crate::functions::{FunctionRegistry, TableFn, TableOutput, TableParams};
use crate::spec::TransformSpec;
use crate::types::{DataSet, DataType, Field, Metadata};

struct TableStep {
    handler: TableFn,
    params: TableParams,
}

impl TableStep {
    fn call(&self, table: &DataSet) -> TransformResult<TableOutput> {
        log::debug!("{} -> {}", self.params.transform, self.params.output);
        (self.handler)(table, &self.params)
    }
}

/// A compiled tabular spec: each entry names a table function plus its parameter block.
pub struct TableTransformer {
    steps: Vec<TableStep>,
}

impl TableTransformer {
    /// Resolve entry names against `registry` and validate their parameters.
    pub fn new(spec: &TransformSpec, registry: &FunctionRegistry) -> TransformResult<Self> {
        let mut steps = Vec::with_capacity(spec.len());
        for entry in spec.entries() {
            let function = registry.table(&entry.name)?;
            let params = TableParams::compile(entry, &function, registry)?;
            steps.push(TableStep {
                handler: function.handler,
                params,
            });
        }
        Ok(Self { steps })
    }

    /// Parse `meta` and compile it against the built-in registry.
    pub fn from_meta(meta: &[serde_json::Value]) -> TransformResult<Self> {
        Self::new(&TransformSpec::from_meta(meta)?, &FunctionRegistry::builtin())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every entry in order, writing each result to column `output`.
    ///
    /// Later entries see the columns written by earlier ones. A scalar result is repeated down
    /// the column; an existing column of the same name is replaced.
    pub fn run_columns(&self, mut table: DataSet) -> TransformResult<DataSet> {
        for step in &self.steps {
            let output = &step.params.output;
            match step.call(&table)? {
                TableOutput::Column { data_type, values } => {
                    table.set_column(Field::new(output.as_str(), data_type), values)?;
                }
                TableOutput::Scalar(value) => {
                    let data_type = value.data_type().unwrap_or(DataType::Float64);
                    let values = vec![value; table.row_count()];
                    table.set_column(Field::new(output.as_str(), data_type), values)?;
                }
                TableOutput::Fields(_) => {
                    return Err(TransformError::invalid_input(
                        &step.params.transform,
                        "produces several values and cannot be written as a column",
                    ));
                }
            }
        }
        log::info!(
            "applied {} column transforms to {} rows",
            self.steps.len(),
            table.row_count()
        );
        Ok(table)
    }

    /// Run every entry in order and collect the results into one flat mapping.
    ///
    /// Scalars are stored under `output`; multi-aggregator results are merged in.
    pub fn run_metadata(&self, table: &DataSet) -> TransformResult<Metadata> {
        let mut out = Metadata::new();
        for step in &self.steps {
            match step.call(table)? {
                TableOutput::Scalar(value) => out.insert(step.params.output.as_str(), value),
                TableOutput::Fields(fields) => out.extend(fields),
                TableOutput::Column { .. } => {
                    return Err(TransformError::invalid_input(
                        &step.params.transform,
                        "produces a per-row column and cannot be used as metadata",
                    ));
                }
            }
        }
        log::info!("computed {} metadata fields from {} rows", out.len(), table.row_count());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::TableTransformer;
    use crate::error::{FunctionKind, TransformError};
    use crate::ingestion::messages_table;
    use crate::types::{DataSet, DataType, Value};
    use serde_json::json;

    fn chat() -> DataSet {
        messages_table(&[
            json!({"dt": "2018-02-10T15:00:00Z", "message_type": 1, "message": "Visitor entered queue"}),
            json!({"dt": "2018-02-10T15:06:00Z", "message_type": 1, "message": "Ana joined the conversation."}),
            json!({"dt": "2018-02-10T15:06:30Z", "message_type": 3, "message": "hi there"}),
            json!({"dt": "2018-02-10T15:08:00Z", "message_type": 4, "message": "hello how are you"}),
            json!({"dt": "2018-02-10T15:10:00Z", "message_type": 3, "message": "ok"}),
        ])
        .unwrap()
    }

    fn columns() -> TableTransformer {
        TableTransformer::from_meta(&[
            json!({"convo_start_indicator": {"output": "convo_start_ind"}}),
            json!({"convo_indicator": {"output": "convo_ind"}}),
            json!({"calc_response_time": {"output": "response_time"}}),
            json!({"word_count": {"output": "words", "column_name": "message"}}),
            json!({"calc_wait_time": {"output": "wait_time"}}),
        ])
        .unwrap()
    }

    #[test]
    fn run_columns_adds_columns_in_order() {
        let out = columns().run_columns(chat()).unwrap();
        let names: Vec<_> = out.schema.field_names().collect();
        assert_eq!(
            names,
            vec![
                "sender",
                "dt",
                "message_type",
                "message",
                "contact_id",
                "display_name",
                "convo_start_ind",
                "convo_ind",
                "response_time",
                "words",
                "wait_time"
            ]
        );
        let convo: Vec<_> = out.column("convo_ind").unwrap().into_iter().cloned().collect();
        assert_eq!(
            convo,
            vec![Value::Int64(0), Value::Int64(0), Value::Int64(1), Value::Int64(1), Value::Int64(1)]
        );
        let wait = out.column("wait_time").unwrap();
        assert!(wait.iter().all(|v| **v == Value::Float64(6.5)));
        let idx = out.schema.index_of("wait_time").unwrap();
        assert_eq!(out.schema.fields[idx].data_type, DataType::Float64);
    }

    #[test]
    fn run_columns_replaces_existing_column() {
        let t = TableTransformer::from_meta(&[json!({"str_length": {"output": "message", "column_name": "message"}})])
            .unwrap();
        let out = t.run_columns(chat()).unwrap();
        assert_eq!(out.schema.fields.len(), 6);
        assert_eq!(out.column("message").unwrap()[4], &Value::Int64(2));
    }

    #[test]
    fn run_metadata_collects_scalars_and_fan_out() {
        let table = columns().run_columns(chat()).unwrap();
        let t = TableTransformer::from_meta(&[
            json!({"calc_wait_time": {"output": "wait_time"}}),
            json!({"calc_handle_time": {"output": "handle_time"}}),
            json!({"row_count": {"output": "agent_messages", "filters": [
                {"column": "message_type", "operator": "eq", "value": 3, "value_type": "int"}
            ]}}),
            json!({"column_operator": {
                "output": "words", "column": "words", "aggregator": ["sum", "max"]
            }}),
        ])
        .unwrap();
        let meta = t.run_metadata(&table).unwrap();
        assert_eq!(
            meta.keys().collect::<Vec<_>>(),
            vec!["wait_time", "handle_time", "agent_messages", "sum_words", "max_words"]
        );
        assert_eq!(meta.get("wait_time"), Some(&Value::Float64(6.5)));
        assert_eq!(meta.get("handle_time"), Some(&Value::Float64(3.5)));
        assert_eq!(meta.get("agent_messages"), Some(&Value::Int64(2)));
        assert_eq!(meta.get("sum_words"), Some(&Value::Int64(14)));
        assert_eq!(meta.get("max_words"), Some(&Value::Int64(4)));
    }

    #[test]
    fn column_function_in_metadata_spec_is_rejected() {
        let t = TableTransformer::from_meta(&[json!({"convo_indicator": {"output": "c"}})]).unwrap();
        let err = t.run_metadata(&chat()).unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput { .. }));
    }

    #[test]
    fn unknown_table_function_fails_at_compile_time() {
        let err = TableTransformer::from_meta(&[json!({"sentiment": {"output": "s"}})])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TransformError::UnknownFunction {
                kind: FunctionKind::Table,
                ..
            }
        ));
    }

    #[test]
    fn missing_indicator_column_surfaces_as_missing_column() {
        let t = TableTransformer::from_meta(&[json!({"calc_wait_time": {"output": "w"}})]).unwrap();
        let err = t.run_metadata(&chat()).unwrap_err();
        assert!(err.to_string().contains("missing column 'convo_ind'"));
    }
}
