//! Output module
//!
//! Handles writing flattened rows.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Writing rows as tab-delimited text with a header row
//! - Naming run output files by timestamp
//! - Regrouping a finished row file into JSON

mod json;
mod writer;

pub use json::{convert_file, rows_to_json};
pub use writer::{
    file_stamp, output_path, RowSink, TsvWriter, DEFAULT_FILE_PREFIX, HEADER,
};
