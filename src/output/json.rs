//! Row file to JSON conversion
//!
//! Regroups a finished row file into one JSON object per record:
//! `{ "<record_id>": { "<key>": "<value>" } }`. A key that occurs more than
//! once in a record (object array elements flatten to bare keys) collects
//! its values into an array in file order.

use super::writer::HEADER;
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Group the rows of a tab-delimited file by record
pub fn rows_to_json(reader: impl BufRead) -> Result<JsonObject> {
    let mut lines = reader.lines();

    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| Error::output("row file is empty"))?;
    if header.split('\t').ne(HEADER.iter().copied()) {
        return Err(Error::output(format!("unexpected header row: {header:?}")));
    }

    let mut records = JsonObject::new();

    for (index, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let mut fields = line.splitn(3, '\t');
        let (Some(record_id), Some(key), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(Error::output(format!(
                "line {} does not have three fields",
                index + 2
            )));
        };

        let entry = records
            .entry(record_id.to_string())
            .or_insert_with(|| JsonValue::Object(JsonObject::new()));
        let JsonValue::Object(fields) = entry else {
            continue;
        };

        let value = JsonValue::String(value.to_string());
        match fields.get_mut(key) {
            None => {
                fields.insert(key.to_string(), value);
            }
            Some(JsonValue::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = JsonValue::Array(vec![first, value]);
            }
        }
    }

    Ok(records)
}

/// Convert a row file to a pretty-printed `.json` file next to it
///
/// Returns the path of the JSON file.
pub fn convert_file(txt_path: impl AsRef<Path>) -> Result<PathBuf> {
    let txt_path = txt_path.as_ref();
    let file = File::open(txt_path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::FileNotFound {
            path: txt_path.display().to_string(),
        },
        _ => Error::Io(e),
    })?;

    let records = rows_to_json(BufReader::new(file))?;
    let json_path = txt_path.with_extension("json");

    let mut writer = BufWriter::new(File::create(&json_path)?);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    debug!(records = records.len(), path = %json_path.display(), "Wrote JSON output");
    Ok(json_path)
}
