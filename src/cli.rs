//! CLI argument parsing for icescape-etl

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "icescape-etl")]
#[command(author, version, about = "Transform Icescape contact and transcript exports into flat tables", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load contacts files into the contacts table
    Contacts {
        /// Files to load (default: contacts_pattern in input_dir)
        files: Vec<PathBuf>,
    },

    /// Load transcript files into the transcripts and transcript_metadata tables
    Transcripts {
        /// Files to load (default: transcripts_pattern in input_dir)
        files: Vec<PathBuf>,
    },

    /// Extract survey distress scores from transcript files
    Scores {
        /// Files to load (default: transcripts_pattern in input_dir)
        files: Vec<PathBuf>,
    },

    /// Run contacts, transcripts and scores over the input directory
    Run,

    /// Compile every transform group and report problems without loading anything
    Check,

    /// List the registered transform functions
    Functions,
}
