//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Directory user extractor and JSON flattener
#[derive(Parser, Debug)]
#[command(name = "dirflat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Extraction configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Format of status messages on stdout
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire an access token to test the credentials
    Check,

    /// Fetch every page of users and write the flattened rows
    Extract {
        /// Directory for the row file (overrides the config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Also write a JSON rendition of the row file
        #[arg(long)]
        json: bool,

        /// First request path (overrides the config)
        #[arg(long)]
        initial_path: Option<String>,
    },

    /// Flatten a local JSON file (record, array of records or page)
    Flatten {
        /// Input JSON file
        input: PathBuf,

        /// Row file to create; rows go to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record identifier field (overrides the config)
        #[arg(long)]
        id_field: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
