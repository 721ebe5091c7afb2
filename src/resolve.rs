//! Nested key resolution for record-mode transforms.
//!
//! Spec entries name their source with a compound key such as `Value|IMMessages|Value`. Each
//! segment is looked up in the mapping reached by the previous one. A missing segment (or a
//! non-object intermediate) bottoms out as absent; resolution itself never fails.

use std::fmt;

/// Separator between segments of a compound key.
pub const KEY_SEPARATOR: char = '|';

/// A parsed compound key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Split `path` on [`KEY_SEPARATOR`].
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split(KEY_SEPARATOR).map(str::to_string).collect(),
        }
    }

    /// Walk `record` left to right.
    ///
    /// Returns `None` when any segment is missing or an intermediate value is not an object.
    pub fn resolve<'a>(&self, record: &'a serde_json::Value) -> Option<&'a serde_json::Value> {
        self.segments
            .iter()
            .try_fold(record, |current, segment| current.as_object()?.get(segment))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("|"))
    }
}
