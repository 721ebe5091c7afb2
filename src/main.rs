use std::path::PathBuf;

use clap::Parser;
use eyre::{bail, Context, Result};
use log::info;

use icescape_etl::cli::{Cli, Command};
use icescape_etl::config::{PipelineConfig, TransformConfig};
use icescape_etl::execution::{BatchOptions, BatchRunner};
use icescape_etl::functions::FunctionRegistry;
use icescape_etl::ingestion::discover;
use icescape_etl::load::CsvLoader;
use icescape_etl::pipeline::{JobKind, Pipeline, RunSummary, Transforms};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn inputs(files: Vec<PathBuf>, config: &PipelineConfig, pattern: &str) -> Result<Vec<PathBuf>> {
    if !files.is_empty() {
        return Ok(files);
    }
    discover(&config.input_dir, pattern)
        .with_context(|| format!("Failed to list {} in {}", pattern, config.input_dir.display()))
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let registry = FunctionRegistry::builtin();

    if let Command::Functions = cli.command {
        println!("record: {}", registry.record_names().join(", "));
        println!("table:  {}", registry.table_names().join(", "));
        return Ok(());
    }

    let transform_config = TransformConfig::load(&config.transforms_path)
        .with_context(|| format!("Failed to read transforms from {}", config.transforms_path.display()))?;
    let transforms = Transforms::compile(&transform_config, &registry).context("Invalid transform configuration")?;

    if let Command::Check = cli.command {
        let groups: Vec<_> = transform_config.group_names().collect();
        println!("ok: {} transform groups ({})", groups.len(), groups.join(", "));
        return Ok(());
    }

    info!("icescape-etl starting");

    let runner = BatchRunner::new(BatchOptions {
        num_threads: config.num_threads,
    })?;
    let loader = CsvLoader::new(&config.output_dir);
    let mut pipeline = Pipeline::new(transforms, loader, runner).with_alert_threshold(config.alert_at_or_above);

    let mut summaries: Vec<RunSummary> = Vec::new();
    match cli.command {
        Command::Contacts { files } => {
            let files = inputs(files, &config, &config.contacts_pattern)?;
            summaries.push(pipeline.run_job(JobKind::Contacts, &files));
        }
        Command::Transcripts { files } => {
            let files = inputs(files, &config, &config.transcripts_pattern)?;
            summaries.push(pipeline.run_job(JobKind::Transcript, &files));
        }
        Command::Scores { files } => {
            let files = inputs(files, &config, &config.transcripts_pattern)?;
            summaries.push(pipeline.run_job(JobKind::DistressScore, &files));
        }
        Command::Run => {
            let contacts = inputs(Vec::new(), &config, &config.contacts_pattern)?;
            summaries.push(pipeline.run_job(JobKind::Contacts, &contacts));
            let transcripts = inputs(Vec::new(), &config, &config.transcripts_pattern)?;
            summaries.push(pipeline.run_job(JobKind::Transcript, &transcripts));
            summaries.push(pipeline.run_job(JobKind::DistressScore, &transcripts));
        }
        Command::Check | Command::Functions => {}
    }

    let failed: usize = summaries.iter().map(|s| s.failed).sum();
    let rows: usize = summaries.iter().map(|s| s.rows).sum();
    println!("loaded {} rows into {}", rows, config.output_dir.display());
    if failed > 0 {
        bail!("{} files failed to load", failed);
    }
    Ok(())
}
