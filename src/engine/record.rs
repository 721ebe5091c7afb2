//! Record-mode interpretation.

use crate::error::{TransformError, TransformResult};
use crate::functions::{FieldOutput, FunctionRegistry, RecordFn};
use crate::resolve::KeyPath;
use crate::spec::TransformSpec;

static NULL: serde_json::Value = serde_json::Value::Null;

/// Flat output record.
pub type Record = serde_json::Map<String, serde_json::Value>;

struct RecordStep {
    source: KeyPath,
    name: Option<String>,
    transform: Option<(String, RecordFn)>,
}

/// A compiled record spec.
///
/// Each entry resolves its source path in the input record, optionally passes the value through
/// a named function, and then either spreads a mapping result into the output or stores a
/// scalar under the entry's `name`.
pub struct RecordTransformer {
    steps: Vec<RecordStep>,
}

impl RecordTransformer {
    /// Resolve every `transform:` name against `registry`.
    pub fn new(spec: &TransformSpec, registry: &FunctionRegistry) -> TransformResult<Self> {
        let mut steps = Vec::with_capacity(spec.len());
        for entry in spec.entries() {
            let transform = match entry.str_param("transform")? {
                Some(func) => Some((func.to_string(), registry.record(func)?)),
                None => None,
            };
            steps.push(RecordStep {
                source: KeyPath::parse(&entry.name),
                name: entry.str_param("name")?.map(str::to_string),
                transform,
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

    /// Apply every entry, in order, to one record.
    ///
    /// An absent source resolves to null, except for a plain spread entry (no `name`, no
    /// `transform`), which then merges nothing. Mapping results are merged key by key, later entries
    /// overwriting earlier ones. The first function error aborts the call.
    pub fn run(&self, record: &serde_json::Value) -> TransformResult<Record> {
        let mut out = Record::new();
        for step in &self.steps {
            let resolved = step.source.resolve(record);
            if resolved.is_none() && step.transform.is_none() && step.name.is_none() {
                continue;
            }
            let value = resolved.unwrap_or(&NULL);
            let output = match &step.transform {
                Some((func, f)) => {
                    log::debug!("{} -> {}", step.source, func);
                    f(value)?
                }
                None => FieldOutput::from_value(value.clone()),
            };
            match output {
                FieldOutput::Fields(fields) => {
                    for (k, v) in fields {
                        out.insert(k, v);
                    }
                }
                FieldOutput::Scalar(v) => {
                    let name = step.name.as_ref().ok_or_else(|| TransformError::MissingParameter {
                        transform: step.source.to_string(),
                        key: "name".to_string(),
                    })?;
                    out.insert(name.clone(), v);
                }
            }
        }
        Ok(out)
    }

    /// Apply [`Self::run`] to each record, stopping at the first failure.
    pub fn run_all<'a, I>(&self, records: I) -> TransformResult<Vec<Record>>
    where
        I: IntoIterator<Item = &'a serde_json::Value>,
    {
        records.into_iter().map(|r| self.run(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::RecordTransformer;
    use crate::error::{FunctionKind, TransformError};
    use crate::functions::{FieldOutput, FunctionRegistry};
    use crate::spec::TransformSpec;
    use serde_json::json;

    #[test]
    fn nested_key_to_named_output() {
        let t = RecordTransformer::from_meta(&[json!({"a|b": {"name": "out_a"}})]).unwrap();
        let out = t.run(&json!({"a": {"b": 5}})).unwrap();
        assert_eq!(serde_json::Value::Object(out), json!({"out_a": 5}));
    }

    #[test]
    fn absent_nested_key_becomes_null() {
        let t = RecordTransformer::from_meta(&[json!({"a|b": {"name": "out_a"}})]).unwrap();
        let out = t.run(&json!({"a": {}})).unwrap();
        assert_eq!(serde_json::Value::Object(out), json!({"out_a": null}));
        let out = t.run(&json!({})).unwrap();
        assert_eq!(serde_json::Value::Object(out), json!({"out_a": null}));
    }

    #[test]
    fn object_values_are_spread() {
        let t = RecordTransformer::from_meta(&[
            json!({"Agent": {}}),
            json!({"ContactID": {"name": "contact_id"}}),
        ])
        .unwrap();
        let out = t
            .run(&json!({"Agent": {"id": "a1", "site": "east"}, "ContactID": 12}))
            .unwrap();
        assert_eq!(
            serde_json::Value::Object(out),
            json!({"id": "a1", "site": "east", "contact_id": 12})
        );
    }

    #[test]
    fn spread_entry_over_absent_key_merges_nothing() {
        let t = RecordTransformer::from_meta(&[
            json!({"Agent": {}}),
            json!({"ContactID": {"name": "contact_id"}}),
        ])
        .unwrap();
        let out = t.run(&json!({"ContactID": 1})).unwrap();
        assert_eq!(serde_json::Value::Object(out), json!({"contact_id": 1}));
    }

    #[test]
    fn function_fan_out_merges_with_last_write_wins() {
        let t = RecordTransformer::from_meta(&[
            json!({"Primary": {"name": "agent_id"}}),
            json!({"Handlers": {"transform": "parse_handlers"}}),
        ])
        .unwrap();
        let out = t.run(&json!({"Primary": "X", "Handlers": ["A", "B", "C"]})).unwrap();
        assert_eq!(
            serde_json::Value::Object(out),
            json!({"agent_id": "A", "secondary_agents": "B,C"})
        );
    }

    #[test]
    fn output_keys_follow_declaration_order() {
        let t = RecordTransformer::from_meta(&[
            json!({"z": {"name": "zed"}}),
            json!({"a": {"name": "alpha"}}),
        ])
        .unwrap();
        let out = t.run(&json!({"a": 1, "z": 2})).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["zed", "alpha"]);
    }

    #[test]
    fn input_record_is_untouched() {
        let t = RecordTransformer::from_meta(&[json!({"Messages": {"name": "messages", "transform": "parse_messages"}})])
            .unwrap();
        let record = json!({"Messages": [{"Message": "a\n b", "IsHtml": false}]});
        let before = record.clone();
        let out = t.run(&record).unwrap();
        assert_eq!(record, before);
        assert_eq!(out["messages"], json!([{"message": "a b"}]));
    }

    #[test]
    fn unknown_transform_fails_at_compile_time() {
        let err = RecordTransformer::from_meta(&[json!({"x": {"transform": "nope"}})])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TransformError::UnknownFunction {
                kind: FunctionKind::Record,
                ..
            }
        ));
    }

    #[test]
    fn scalar_without_name_is_an_error() {
        let t = RecordTransformer::from_meta(&[json!({"x": {}})]).unwrap();
        let err = t.run(&json!({"x": 3})).unwrap_err();
        assert!(err.to_string().contains("missing required parameter 'name'"));
    }

    #[test]
    fn function_errors_propagate() {
        let t = RecordTransformer::from_meta(&[json!({"Handlers": {"transform": "parse_handlers"}})]).unwrap();
        assert!(t.run(&json!({"Handlers": 5})).is_err());
        let err = t
            .run_all([&json!({"Handlers": ["A"]}), &json!({"Handlers": {}})])
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput { .. }));
    }

    #[test]
    fn custom_registry_is_used() {
        let mut registry = FunctionRegistry::new();
        registry.register_record("double", |v| {
            Ok(FieldOutput::Scalar(json!(v.as_i64().unwrap_or_default() * 2)))
        });
        let spec = TransformSpec::from_meta(&[json!({"n": {"name": "n2", "transform": "double"}})]).unwrap();
        let t = RecordTransformer::new(&spec, &registry).unwrap();
        let out = t.run(&json!({"n": 21})).unwrap();
        assert_eq!(out["n2"], json!(42));
    }
}
