//! Per-file jobs that read vendor exports, run the configured transforms and hand flat rows to a
//! [`Loader`].
//!
//! - contacts: one row per contact into `contacts`
//! - transcripts: one row per message into `transcripts`, plus one summary row into
//!   `transcript_metadata`
//! - distress scores: one row per transcript into `distress_scores`
//!
//! Batch runs continue past a failing file; each outcome is reported to the configured
//! [`PipelineObserver`] and counted in the returned [`RunSummary`].

mod observability;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use crate::config::{
    TransformConfig, CONTACTS_GROUP, TRANSCRIPT_COLUMNS_GROUP, TRANSCRIPT_GROUP, TRANSCRIPT_METADATA_GROUP,
};
use crate::engine::{RecordTransformer, TableTransformer};
use crate::error::{TransformError, TransformResult};
use crate::execution::BatchRunner;
use crate::functions::FunctionRegistry;
use crate::ingestion::{interaction_type, messages_table, read_json_path, read_records_path};
use crate::load::{dataset_to_rows, metadata_to_row, records_to_rows, Loader};
use crate::spec::TransformSpec;
use crate::types::{Metadata, Value};

pub use observability::{
    CompositeObserver, JobContext, JobKind, JobStats, LogObserver, PipelineObserver, Severity,
};

pub const CONTACTS_TABLE: &str = "contacts";
pub const TRANSCRIPTS_TABLE: &str = "transcripts";
pub const TRANSCRIPT_METADATA_TABLE: &str = "transcript_metadata";
pub const DISTRESS_SCORES_TABLE: &str = "distress_scores";

/// Field of the transcript record holding the remapped messages.
pub const MESSAGES_FIELD: &str = "messages";
/// Field carrying the contact id in transcript records and metadata rows.
pub const CONTACT_ID_FIELD: &str = "contact_id";

/// Every transform the jobs use, compiled once.
pub struct Transforms {
    contacts: Option<RecordTransformer>,
    transcript: Option<RecordTransformer>,
    transcript_columns: Option<TableTransformer>,
    transcript_metadata: Option<TableTransformer>,
    distress_score: RecordTransformer,
}

impl Transforms {
    /// Compile the configured groups against `registry`. Any invalid group fails the whole call.
    pub fn compile(config: &TransformConfig, registry: &FunctionRegistry) -> TransformResult<Self> {
        let record = |name: &str| -> TransformResult<Option<RecordTransformer>> {
            config
                .optional_group(name)?
                .map(|spec| RecordTransformer::new(&spec, registry))
                .transpose()
        };
        let table = |name: &str| -> TransformResult<Option<TableTransformer>> {
            config
                .optional_group(name)?
                .map(|spec| TableTransformer::new(&spec, registry))
                .transpose()
        };
        let distress_score = RecordTransformer::new(
            &TransformSpec::from_meta(&[
                json!({"Value|ContactID": {"name": CONTACT_ID_FIELD}}),
                json!({"Value|IMMessages|Value": {"name": "score", "transform": "distress_score"}}),
            ])?,
            registry,
        )?;

        Ok(Self {
            contacts: record(CONTACTS_GROUP)?,
            transcript: record(TRANSCRIPT_GROUP)?,
            transcript_columns: table(TRANSCRIPT_COLUMNS_GROUP)?,
            transcript_metadata: table(TRANSCRIPT_METADATA_GROUP)?,
            distress_score,
        })
    }
}

fn required<'a, T>(transform: &'a Option<T>, group: &str) -> TransformResult<&'a T> {
    transform
        .as_ref()
        .ok_or_else(|| TransformError::config(format!("transform group '{group}' is not configured")))
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Outcome counts of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub empty: usize,
    pub failed: usize,
    pub rows: usize,
}

impl RunSummary {
    pub fn files(&self) -> usize {
        self.succeeded + self.empty + self.failed
    }
}

pub struct Pipeline<L> {
    transforms: Transforms,
    loader: L,
    runner: BatchRunner,
    observer: Arc<dyn PipelineObserver>,
    alert_at_or_above: Severity,
}

impl<L: Loader> Pipeline<L> {
    /// Events go to a [`LogObserver`] and alerts fire at [`Severity::Critical`] until configured
    /// otherwise.
    pub fn new(transforms: Transforms, loader: L, runner: BatchRunner) -> Self {
        Self {
            transforms,
            loader,
            runner,
            observer: Arc::new(LogObserver),
            alert_at_or_above: Severity::Critical,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_alert_threshold(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn into_loader(self) -> L {
        self.loader
    }

    /// Transform a contacts file and load it into `contacts`.
    ///
    /// Each row gains `interaction_type` (file name prefix), `transcript_downloaded = false` and
    /// `load_file`. An empty file loads nothing.
    pub fn load_contacts(&mut self, path: &Path) -> TransformResult<JobStats> {
        log::info!("Parsing contact file {}", path.display());
        let contacts = read_records_path(path)?;
        if contacts.is_empty() {
            return Ok(JobStats::default());
        }
        let transformer = required(&self.transforms.contacts, CONTACTS_GROUP)?;

        let file = base_name(path);
        let kind = interaction_type(path);
        let mut parsed = self.runner.run(transformer, &contacts)?;
        for contact in &mut parsed {
            contact.insert("interaction_type".to_string(), kind.clone().into());
            contact.insert("transcript_downloaded".to_string(), false.into());
            contact.insert("load_file".to_string(), file.clone().into());
        }

        let (columns, rows) = records_to_rows(&parsed);
        let rows = self.loader.load(CONTACTS_TABLE, &columns, &rows)?;
        Ok(JobStats { rows })
    }

    /// Transform a transcript file into its message rows and summary row.
    ///
    /// The `transcript` record spec must produce a `messages` list (see `parse_messages`) and a
    /// `contact_id`. Column and metadata specs run only when configured.
    pub fn load_transcript(&mut self, path: &Path) -> TransformResult<JobStats> {
        log::info!("Parsing transcript file {}", path.display());
        let document = read_json_path(path)?;
        let transformer = required(&self.transforms.transcript, TRANSCRIPT_GROUP)?;
        let record = transformer.run(&document)?;

        let messages = match record.get(MESSAGES_FIELD) {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items.clone(),
            Some(other) => {
                return Err(TransformError::invalid_input(
                    TRANSCRIPT_GROUP,
                    format!("'{MESSAGES_FIELD}' must be a list, got {other}"),
                ));
            }
        };
        if messages.is_empty() {
            return Ok(JobStats::default());
        }
        let contact_id = record
            .get(CONTACT_ID_FIELD)
            .map(Value::from_json)
            .unwrap_or(Value::Null);

        let mut table = messages_table(&messages)?;
        if let Some(columns) = &self.transforms.transcript_columns {
            table = columns.run_columns(table)?;
        }
        let (columns, rows) = dataset_to_rows(&table);
        let mut loaded = self.loader.load(TRANSCRIPTS_TABLE, &columns, &rows)?;

        if let Some(metadata) = &self.transforms.transcript_metadata {
            let mut summary = Metadata::new();
            summary.insert(CONTACT_ID_FIELD, contact_id);
            summary.extend(metadata.run_metadata(&table)?);
            let (columns, row) = metadata_to_row(&summary);
            loaded += self.loader.load(TRANSCRIPT_METADATA_TABLE, &columns, &[row])?;
        }
        Ok(JobStats { rows: loaded })
    }

    /// Extract the survey distress score of a transcript and load it into `distress_scores`.
    pub fn load_distress_score(&mut self, path: &Path) -> TransformResult<JobStats> {
        let document = read_json_path(path)?;
        let record = self.transforms.distress_score.run(&document)?;
        let (columns, rows) = records_to_rows(std::slice::from_ref(&record));
        let rows = self.loader.load(DISTRESS_SCORES_TABLE, &columns, &rows)?;
        Ok(JobStats { rows })
    }

    /// Run one job over many files, reporting each outcome to the observer.
    pub fn run_job(&mut self, kind: JobKind, paths: &[PathBuf]) -> RunSummary {
        let mut summary = RunSummary::default();
        for path in paths {
            let ctx = JobContext {
                path: path.clone(),
                kind,
            };
            let result = match kind {
                JobKind::Contacts => self.load_contacts(path),
                JobKind::Transcript => self.load_transcript(path),
                JobKind::DistressScore => self.load_distress_score(path),
            };
            match result {
                Ok(stats) if stats.rows == 0 => {
                    summary.empty += 1;
                    self.observer.on_warning(&ctx, "nothing to load");
                }
                Ok(stats) => {
                    summary.succeeded += 1;
                    summary.rows += stats.rows;
                    self.observer.on_success(&ctx, stats);
                }
                Err(e) => {
                    summary.failed += 1;
                    let severity = Severity::of(&e);
                    self.observer.on_failure(&ctx, severity, &e);
                    if severity >= self.alert_at_or_above {
                        self.observer.on_alert(&ctx, severity, &e);
                    }
                }
            }
        }
        log::info!(
            "[{}] {} files: {} loaded, {} empty, {} failed, {} rows",
            kind,
            summary.files(),
            summary.succeeded,
            summary.empty,
            summary.failed,
            summary.rows
        );
        summary
    }
}
