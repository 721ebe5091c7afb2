//! Transform specification loading.
//!
//! A transform group in `transforms.yml` is an ordered list of single-key mappings:
//!
//! ```yaml
//! contacts:
//!   - ContactID:
//!       name: contact_id
//!   - Handlers:
//!       transform: parse_handlers
//!   - __reserved__:
//!       note: ignored
//! ```
//!
//! [`TransformSpec::from_meta`] turns such a list into ordered [`TransformEntry`] values. Keys
//! wrapped in double underscores are reserved: they are parsed but kept out of the executable
//! entries.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{TransformError, TransformResult};

static RESERVED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__.*__").expect("reserved key pattern is valid"));

/// Parameter block of one spec entry.
pub type Items = serde_json::Map<String, serde_json::Value>;

/// One declarative rule: an identifier plus its parameter block.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformEntry {
    /// Source path (record mode) or function name (tabular mode).
    pub name: String,
    /// Parameters such as `name`, `output`, `transform`, `column`, `filters`.
    pub items: Items,
}

impl TransformEntry {
    /// A string parameter, if present and a string.
    pub fn str_param(&self, key: &str) -> TransformResult<Option<&str>> {
        match self.items.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(TransformError::config(format!(
                "entry '{}': parameter '{key}' must be a string, got {other}",
                self.name
            ))),
        }
    }

    /// A string parameter that must be present.
    pub fn require_str(&self, key: &str) -> TransformResult<&str> {
        self.str_param(key)?
            .ok_or_else(|| TransformError::MissingParameter {
                transform: self.name.clone(),
                key: key.to_string(),
            })
    }
}

/// Ordered, immutable list of executable entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformSpec {
    entries: Vec<TransformEntry>,
    reserved: Vec<TransformEntry>,
}

impl TransformSpec {
    /// Parse a list of single-key mappings.
    ///
    /// Fails with [`TransformError::Config`] if an element is not a mapping with exactly one key
    /// or if its value is not a mapping. Nothing is returned on failure.
    pub fn from_meta(meta: &[serde_json::Value]) -> TransformResult<Self> {
        let mut spec = TransformSpec::default();
        for (idx, element) in meta.iter().enumerate() {
            let obj = element.as_object().ok_or_else(|| {
                TransformError::config(format!("entry {idx} is not a mapping: {element}"))
            })?;
            if obj.len() != 1 {
                return Err(TransformError::config(format!(
                    "entry {idx} must have exactly one key, found {}",
                    obj.len()
                )));
            }
            let Some((name, value)) = obj.iter().next() else {
                continue;
            };
            let items = value.as_object().cloned().ok_or_else(|| {
                TransformError::config(format!("entry '{name}': items must be a mapping, got {value}"))
            })?;
            let entry = TransformEntry {
                name: name.clone(),
                items,
            };
            if is_reserved(name) {
                spec.reserved.push(entry);
            } else {
                spec.entries.push(entry);
            }
        }
        Ok(spec)
    }

    /// Parse a YAML document holding one transform list.
    pub fn from_yaml_str(input: &str) -> TransformResult<Self> {
        let meta: Vec<serde_json::Value> = serde_yaml::from_str(input)?;
        Self::from_meta(&meta)
    }

    /// Executable entries in declaration order.
    pub fn entries(&self) -> &[TransformEntry] {
        &self.entries
    }

    /// Entries whose key is reserved (`__...__`); never executed.
    pub fn reserved(&self) -> &[TransformEntry] {
        &self.reserved
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether an entry key is reserved for future use.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_KEY.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::{is_reserved, TransformSpec};
    use crate::error::TransformError;
    use serde_json::json;

    #[test]
    fn parses_entries_in_order_and_skips_reserved() {
        let meta = vec![
            json!({"ContactID": {"name": "contact_id"}}),
            json!({"__meta__": {"version": 2}}),
            json!({"Handlers": {"transform": "parse_handlers"}}),
        ];
        let spec = TransformSpec::from_meta(&meta).unwrap();
        let names: Vec<_> = spec.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ContactID", "Handlers"]);
        assert_eq!(spec.reserved().len(), 1);
        assert_eq!(spec.entries()[0].str_param("name").unwrap(), Some("contact_id"));
    }

    #[test]
    fn rejects_multi_key_entry() {
        let meta = vec![json!({"a": {"name": "x"}, "b": {"name": "y"}})];
        let err = TransformSpec::from_meta(&meta).unwrap_err();
        assert!(matches!(err, TransformError::Config { .. }));
        assert!(err.to_string().contains("exactly one key"));
    }

    #[test]
    fn rejects_empty_entry() {
        let err = TransformSpec::from_meta(&[json!({})]).unwrap_err();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn rejects_non_mapping_items() {
        let err = TransformSpec::from_meta(&[json!({"a": "name"})]).unwrap_err();
        assert!(err.to_string().contains("items must be a mapping"));
    }

    #[test]
    fn rejects_non_mapping_entry() {
        let err = TransformSpec::from_meta(&[json!(["a"])]).unwrap_err();
        assert!(err.to_string().contains("not a mapping"));
    }

    #[test]
    fn reserved_pattern_matches_double_underscores() {
        assert!(is_reserved("__defaults__"));
        assert!(is_reserved("x__y__"));
        assert!(!is_reserved("_private_"));
        assert!(!is_reserved("Value|ContactID"));
    }

    #[test]
    fn parses_yaml_list() {
        let spec = TransformSpec::from_yaml_str(
            "- convo_start_indicator:\n    output: convo_start_ind\n- word_count:\n    output: words\n    column_name: message\n",
        )
        .unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.entries()[1].require_str("column_name").unwrap(), "message");
    }

    #[test]
    fn require_str_reports_missing_parameter() {
        let spec = TransformSpec::from_meta(&[json!({"row_count": {}})]).unwrap();
        let err = spec.entries()[0].require_str("output").unwrap_err();
        assert!(matches!(err, TransformError::MissingParameter { .. }));
    }
}
