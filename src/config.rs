//! Configuration types and loading.
//!
//! Two files are involved:
//! - `transforms.yml`: named transform groups, each an ordered list of single-key mappings
//! - `icescape-etl.yml`: pipeline settings (directories, file patterns, alerting)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};
use crate::pipeline::Severity;
use crate::spec::TransformSpec;

/// Record spec applied to every contact.
pub const CONTACTS_GROUP: &str = "contacts";
/// Record spec applied to every transcript document.
pub const TRANSCRIPT_GROUP: &str = "transcript";
/// Column spec applied to the message table of a transcript.
pub const TRANSCRIPT_COLUMNS_GROUP: &str = "transcript_columns";
/// Metadata spec applied to the message table of a transcript.
pub const TRANSCRIPT_METADATA_GROUP: &str = "transcript_metadata";

/// Settings file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "icescape-etl.yml";

/// Named transform groups from `transforms.yml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformConfig {
    groups: BTreeMap<String, Vec<serde_json::Value>>,
}

impl TransformConfig {
    pub fn from_yaml_str(input: &str) -> TransformResult<Self> {
        let groups: Option<BTreeMap<String, Option<Vec<serde_json::Value>>>> = serde_yaml::from_str(input)?;
        let groups = groups
            .unwrap_or_default()
            .into_iter()
            .map(|(name, entries)| (name, entries.unwrap_or_default()))
            .collect();
        Ok(Self { groups })
    }

    pub fn load(path: impl AsRef<Path>) -> TransformResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        log::info!("loaded {} transform groups from {}", config.groups.len(), path.display());
        Ok(config)
    }

    /// Names of the configured groups, sorted.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Parse a group that must be present.
    pub fn group(&self, name: &str) -> TransformResult<TransformSpec> {
        self.optional_group(name)?
            .ok_or_else(|| TransformError::config(format!("transform group '{name}' is not configured")))
    }

    /// Parse a group if present.
    pub fn optional_group(&self, name: &str) -> TransformResult<Option<TransformSpec>> {
        self.groups
            .get(name)
            .map(|meta| {
                TransformSpec::from_meta(meta).map_err(|e| match e {
                    TransformError::Config { message } => {
                        TransformError::config(format!("group '{name}': {message}"))
                    }
                    other => other,
                })
            })
            .transpose()
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transform groups file.
    pub transforms_path: PathBuf,
    /// Directory scanned for input files.
    pub input_dir: PathBuf,
    /// Directory the CSV loader writes to.
    pub output_dir: PathBuf,
    /// Glob for contacts files inside `input_dir`.
    pub contacts_pattern: String,
    /// Glob for transcript files inside `input_dir`.
    pub transcripts_pattern: String,
    /// Failures at or above this severity raise alerts.
    pub alert_at_or_above: Severity,
    /// Worker threads for contact batches; available parallelism when unset.
    pub num_threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transforms_path: PathBuf::from("transforms.yml"),
            input_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            contacts_pattern: "*_contacts.txt".to_string(),
            transcripts_pattern: "*_data.txt".to_string(),
            alert_at_or_above: Severity::Critical,
            num_threads: None,
        }
    }
}

impl PipelineConfig {
    /// Load settings with fallback chain: explicit path, then [`DEFAULT_CONFIG_FILE`] in the
    /// working directory, then defaults.
    pub fn load(config_path: Option<&Path>) -> TransformResult<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> TransformResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }
}
