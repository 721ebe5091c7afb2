//! `icescape_etl` turns Icescape contact-center exports (contact lists and chat transcripts)
//! into flat rows for a relational sink, driven by declarative transform specs.
//!
//! A spec is an ordered list of single-key mappings, usually one group of `transforms.yml`:
//!
//! ```yaml
//! contacts:
//!   - ContactID:
//!       name: contact_id
//!   - Handlers:
//!       transform: parse_handlers
//! ```
//!
//! Specs run in one of two modes:
//!
//! - **record mode** ([`engine::RecordTransformer`]): each entry resolves a `|`-separated path in
//!   a nested JSON record, optionally applies a named function, and writes one or more fields
//!   of a flat output record
//! - **tabular mode** ([`engine::TableTransformer`]): each entry names a function applied to a
//!   whole message table, producing a new column or a field of a metadata mapping
//!
//! Function names resolve through an explicit [`functions::FunctionRegistry`] when the spec is
//! compiled, so typos fail before any data is read.
//!
//! ## Record mode
//!
//! ```rust
//! use icescape_etl::engine::RecordTransformer;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), icescape_etl::TransformError> {
//! let transformer = RecordTransformer::from_meta(&[
//!     json!({"Value|ContactID": {"name": "contact_id"}}),
//!     json!({"Handlers": {"transform": "parse_handlers"}}),
//! ])?;
//! let out = transformer.run(&json!({"Value": {"ContactID": 7}, "Handlers": ["A", "B"]}))?;
//! assert_eq!(out["contact_id"], json!(7));
//! assert_eq!(out["secondary_agents"], json!("B"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Tabular mode
//!
//! ```rust
//! use icescape_etl::engine::TableTransformer;
//! use icescape_etl::ingestion::messages_table;
//! use icescape_etl::types::Value;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), icescape_etl::TransformError> {
//! let table = messages_table(&[
//!     json!({"dt": "2018-02-10T15:00:00Z", "message_type": 3, "message": "hi there"}),
//!     json!({"dt": "2018-02-10T15:01:00Z", "message_type": 4, "message": "hello"}),
//! ])?;
//! let metadata = TableTransformer::from_meta(&[
//!     json!({"word_count": {"output": "words", "column_name": "message"}}),
//! ])?
//! .run_columns(table)?;
//! let summary = TableTransformer::from_meta(&[
//!     json!({"column_operator": {"output": "words", "column": "words", "aggregator": "sum"}}),
//! ])?
//! .run_metadata(&metadata)?;
//! assert_eq!(summary.get("words"), Some(&Value::Int64(3)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`spec`]: spec loading
//! - [`resolve`]: nested key resolution
//! - [`engine`]: record and tabular interpreters
//! - [`functions`]: the function library and registry
//! - [`processing`]: row filters and column reductions
//! - [`types`]: the in-memory table
//! - [`ingestion`]: JSON input and file discovery
//! - [`load`]: relational sink contract and CSV implementation
//! - [`execution`]: parallel record batches
//! - [`pipeline`]: contacts, transcript and distress-score jobs
//! - [`config`]: YAML configuration
//! - [`error`]: the crate error type

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod functions;
pub mod ingestion;
pub mod load;
pub mod pipeline;
pub mod processing;
pub mod resolve;
pub mod spec;
pub mod types;

pub use error::{TransformError, TransformResult};
