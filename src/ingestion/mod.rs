//! Reading pipeline inputs.
//!
//! - [`json`]: vendor JSON files (contacts arrays, transcript objects, NDJSON) and the typed
//!   message table built from remapped chat messages
//! - [`discover`]: locating input files by glob pattern

pub mod discover;
pub mod json;

pub use discover::{discover, interaction_type};
pub use json::{message_schema, messages_table, parse_timestamp, read_json_path, read_records_path, records_from_str};
