//! Record and row types
//!
//! A `Record` is one directory object as returned by the collection endpoint.
//! A `FlatRow` is one `(record_id, key, value)` triple derived from it.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use std::fmt;

/// Literal written for JSON `null` values
pub const NULL_TEXT: &str = "None";

/// One directory object with its extracted identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    id_field: String,
    fields: JsonObject,
}

impl Record {
    /// Build a record from a decoded JSON value.
    ///
    /// The value must be an object whose `id_field` is a string or a number.
    pub fn from_value(value: JsonValue, id_field: &str) -> Result<Self> {
        let JsonValue::Object(fields) = value else {
            return Err(Error::malformed(format!(
                "expected a JSON object record, got {}",
                type_name(&value)
            )));
        };

        let id = match fields.get(id_field) {
            Some(JsonValue::String(s)) if !s.is_empty() => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => return Err(Error::missing_id(id_field)),
        };

        Ok(Self {
            id,
            id_field: id_field.to_string(),
            fields,
        })
    }

    /// The record's unique identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the field the identifier was read from
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// All top-level fields, including the identifier field
    pub fn fields(&self) -> &JsonObject {
        &self.fields
    }
}

/// One flattened `(record_id, key, value)` row
///
/// No field ever contains a tab, newline or carriage return.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlatRow {
    record_id: String,
    key: String,
    value: String,
}

impl FlatRow {
    /// Create a row, stripping delimiter characters from every field
    pub fn new(
        record_id: impl Into<String>,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Self {
        Self {
            record_id: strip_control(&record_id.into()),
            key: strip_control(key.as_ref()),
            value: strip_control(value.as_ref()),
        }
    }

    /// Identifier of the owning record
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// Flattened key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value rendered as text
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Fields in column order
    pub fn fields(&self) -> [&str; 3] {
        [&self.record_id, &self.key, &self.value]
    }
}

impl fmt::Display for FlatRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.record_id, self.key, self.value)
    }
}

/// Render a scalar JSON value as row text
///
/// Objects and arrays are never passed here by the flattener; they fall back
/// to their compact JSON text.
pub fn render_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => NULL_TEXT.to_string(),
        JsonValue::Bool(true) => "True".to_string(),
        JsonValue::Bool(false) => "False".to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Remove tab, newline and carriage return characters
pub fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
