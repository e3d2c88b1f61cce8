//! CLI module
//!
//! Command-line interface for extraction runs.
//!
//! # Commands
//!
//! - `check` - Acquire a token with the configured credentials
//! - `extract` - Fetch all pages and write the row file
//! - `flatten` - Flatten a local JSON file without touching the network

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{extract, load_records, ExtractReport, Outcome, Runner};
