//! In-memory table operations used by the tabular transform functions.
//!
//! - [`filter()`] / [`apply_filters`]: row filtering, by predicate or by configured [`Filter`]s
//! - [`reduce()`]: column reductions ([`ReduceOp`])
//!
//! ## Example: filter then reduce
//!
//! ```rust
//! use icescape_etl::processing::{apply_filters, reduce, Filter, ReduceOp};
//! use icescape_etl::types::{DataSet, DataType, Field, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("message_type", DataType::Int64),
//!     Field::new("words", DataType::Int64),
//! ]);
//! let ds = DataSet::new(
//!     schema,
//!     vec![
//!         vec![Value::Int64(3), Value::Int64(4)],
//!         vec![Value::Int64(4), Value::Int64(10)],
//!         vec![Value::Int64(3), Value::Int64(6)],
//!     ],
//! );
//!
//! let agent_only = Filter::from_json(&serde_json::json!({
//!     "column": "message_type", "operator": "eq", "value": 3, "value_type": "int"
//! }))
//! .unwrap();
//! let filtered = apply_filters(&ds, &[agent_only]).unwrap();
//! assert_eq!(reduce(&filtered, "words", ReduceOp::Mean), Some(Value::Float64(5.0)));
//! ```

pub mod filter;
pub mod reduce;

pub use filter::{apply_filters, filter, CompareOp, Filter};
pub use reduce::{reduce, ReduceOp};
