//! Tab-delimited row writer
//!
//! Each row is its fields joined by a single tab and terminated by a newline.
//! A header row is written once when the writer is created.

use crate::error::Result;
use crate::flatten::{flatten, FlatRow, Record};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Column names of the header row
pub const HEADER: [&str; 3] = ["record_id", "key", "value"];

/// Default output file prefix
pub const DEFAULT_FILE_PREFIX: &str = "graphapi_users";

/// Append-only destination for flattened rows
pub trait RowSink {
    /// Append one row
    fn write_row(&mut self, row: &FlatRow) -> Result<()>;

    /// Flush buffered rows
    fn flush(&mut self) -> Result<()>;

    /// Flatten records in order and append their rows
    ///
    /// Returns the number of rows written.
    fn write_records(&mut self, records: &[Record]) -> Result<u64> {
        let mut written = 0;
        for record in records {
            for row in flatten(record) {
                self.write_row(&row)?;
                written += 1;
            }
        }
        Ok(written)
    }
}

/// Row sink over any writer
pub struct TsvWriter<W: Write> {
    writer: W,
    rows_written: u64,
}

impl<W: Write> TsvWriter<W> {
    /// Create a writer and emit the header row
    pub fn new(mut writer: W) -> Result<Self> {
        write_line(&mut writer, &HEADER)?;
        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    /// Data rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and return the inner writer
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> RowSink for TsvWriter<W> {
    fn write_row(&mut self, row: &FlatRow) -> Result<()> {
        write_line(&mut self.writer, &row.fields())?;
        self.rows_written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl TsvWriter<BufWriter<File>> {
    /// Create a new file and write the header row
    ///
    /// Fails if the file already exists.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> std::fmt::Debug for TsvWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsvWriter")
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

fn write_line<W: Write>(writer: &mut W, fields: &[&str]) -> Result<()> {
    writer.write_all(fields.join("\t").as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Timestamp used in output file names: `YYYYMMDD_HHMMSS_micros`
pub fn file_stamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// Path of a run's row file: `{dir}/{prefix}_{stamp}.txt`
pub fn output_path(dir: impl AsRef<Path>, prefix: &str, at: DateTime<Local>) -> PathBuf {
    dir.as_ref()
        .join(format!("{prefix}_{}.txt", file_stamp(at)))
}
