//! Relational sink contract and its implementations.
//!
//! A [`Loader`] receives `(table_name, columns, rows)` where every row is aligned with
//! `columns`. [`CsvLoader`] appends to one CSV file per table; [`MemoryLoader`] keeps everything
//! in memory.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::engine::record::Record;
use crate::error::{TransformError, TransformResult};
use crate::types::{DataSet, Metadata, Value};

/// Destination for flat rows.
pub trait Loader {
    /// Load `rows` into `table_name`. Returns the number of rows written.
    fn load(&mut self, table_name: &str, columns: &[String], rows: &[Vec<Value>]) -> TransformResult<usize>;
}

/// Columns and aligned rows from flat records.
///
/// Columns are the keys of the first record, in order. A later record missing a column loads
/// null there; keys absent from the first record are dropped.
pub fn records_to_rows(records: &[Record]) -> (Vec<String>, Vec<Vec<Value>>) {
    let Some(first) = records.first() else {
        return (Vec::new(), Vec::new());
    };
    let columns: Vec<String> = first.keys().cloned().collect();
    let rows = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| record.get(c).map(Value::from_json).unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    (columns, rows)
}

/// Columns and rows of a table.
pub fn dataset_to_rows(table: &DataSet) -> (Vec<String>, Vec<Vec<Value>>) {
    let columns = table.schema.field_names().map(str::to_string).collect();
    (columns, table.rows.clone())
}

/// A metadata mapping as a single row.
pub fn metadata_to_row(metadata: &Metadata) -> (Vec<String>, Vec<Value>) {
    metadata
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .unzip()
}

/// Appends rows to `<output_dir>/<table_name>.csv`.
///
/// The header is written when the file is created. Appending to an existing file realigns the
/// incoming columns to its header; unknown columns are rejected.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    output_dir: PathBuf,
}

impl CsvLoader {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// File a table is written to.
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.output_dir.join(format!("{table_name}.csv"))
    }
}

fn existing_header(path: &Path) -> TransformResult<Option<Vec<String>>> {
    if !path.exists() || fs::metadata(path)?.len() == 0 {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    Ok(Some(reader.headers()?.iter().map(str::to_string).collect()))
}

impl Loader for CsvLoader {
    fn load(&mut self, table_name: &str, columns: &[String], rows: &[Vec<Value>]) -> TransformResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        fs::create_dir_all(&self.output_dir)?;
        let path = self.table_path(table_name);

        let header = existing_header(&path)?;
        let order: Vec<Option<usize>> = match &header {
            None => (0..columns.len()).map(Some).collect(),
            Some(header) => {
                if let Some(extra) = columns.iter().find(|c| !header.contains(c)) {
                    return Err(TransformError::config(format!(
                        "column '{extra}' is not in the header of {}",
                        path.display()
                    )));
                }
                header
                    .iter()
                    .map(|h| columns.iter().position(|c| c == h))
                    .collect()
            }
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if header.is_none() {
            writer.write_record(columns)?;
        }
        for row in rows {
            let record: Vec<String> = order
                .iter()
                .map(|idx| idx.and_then(|i| row.get(i)).map(ToString::to_string).unwrap_or_default())
                .collect();
            writer.write_record(&record)?;
        }
        writer.flush()?;

        log::info!("wrote {} rows to {}", rows.len(), path.display());
        Ok(rows.len())
    }
}

/// One table held by [`MemoryLoader`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Keeps loaded rows in memory, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    pub tables: BTreeMap<String, LoadedTable>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, name: &str) -> Option<&LoadedTable> {
        self.tables.get(name)
    }
}

impl Loader for MemoryLoader {
    fn load(&mut self, table_name: &str, columns: &[String], rows: &[Vec<Value>]) -> TransformResult<usize> {
        let table = self.tables.entry(table_name.to_string()).or_default();
        if table.columns.is_empty() {
            table.columns = columns.to_vec();
        }
        table.rows.extend(rows.iter().cloned());
        Ok(rows.len())
    }
}
