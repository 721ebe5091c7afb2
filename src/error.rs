use thiserror::Error;

/// Convenience result type for transform operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Which registry a function name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Record-mode functions (`transform:` in a record spec entry).
    Record,
    /// Tabular-mode functions (the entry key of a column/metadata spec).
    Table,
    /// Post-processing hooks (`post_operator.name`).
    PostOperator,
    /// Column aggregators (`aggregator:`).
    Aggregator,
}

/// Error type returned across the crate.
///
/// A single enum is shared by spec loading, record/table interpretation, ingestion and loading.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decode/encode error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decode/encode error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV write error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed transform configuration. Loading aborts; no partial specs are produced.
    #[error("config error: {message}")]
    Config { message: String },

    /// A function name did not resolve against the registry.
    #[error("unknown {kind:?} function '{name}'")]
    UnknownFunction { kind: FunctionKind, name: String },

    /// A spec entry lacks a parameter its function requires.
    #[error("transform '{transform}' is missing required parameter '{key}'")]
    MissingParameter { transform: String, key: String },

    /// A table function referenced a column the table does not have.
    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    /// A function received input of an unexpected shape.
    #[error("invalid input to '{function}': {message}")]
    InvalidInput { function: String, message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },
}

impl TransformError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(function: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
