//! Spec interpreters.
//!
//! - [`record`]: one nested input record in, one flat output record out
//! - [`table`]: a message table in, derived columns or a flat metadata mapping out
//!
//! Both compile a [`crate::spec::TransformSpec`] against a
//! [`crate::functions::FunctionRegistry`] up front. After that a transformer is immutable and
//! `Send + Sync`, so a single instance can serve any number of records, concurrently if the
//! caller wants.

pub mod record;
pub mod table;

pub use record::RecordTransformer;
pub use table::TableTransformer;
