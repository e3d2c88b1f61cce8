//! Lazy record flattener
//!
//! Walks a record depth-first with an explicit stack, so arbitrarily deep
//! documents never recurse on the call stack. Each frame carries its own
//! addressing context by value: entering an object sets the label for that
//! object's scalars, and popping the frame restores the enclosing label.

use super::types::{render_scalar, FlatRow, Record};
use crate::types::{JsonObject, JsonValue};
use std::borrow::Cow;

/// Flatten a record into rows
pub fn flatten(record: &Record) -> Flatten<'_> {
    Flatten::new(record)
}

/// Iterator over the rows of one record
///
/// Created by [`flatten`]. Holds no state beyond the walk of a single record,
/// so flattening the same record twice yields identical rows.
pub struct Flatten<'a> {
    record_id: &'a str,
    id_field: &'a str,
    stack: Vec<Frame<'a>>,
}

enum Frame<'a> {
    Object {
        entries: serde_json::map::Iter<'a>,
        /// Key of the immediately enclosing object, if any
        label: Option<&'a str>,
        /// Top level of the record
        root: bool,
    },
    Array {
        items: std::iter::Enumerate<std::slice::Iter<'a, JsonValue>>,
        key: Cow<'a, str>,
    },
}

impl<'a> Frame<'a> {
    fn object(map: &'a JsonObject, label: Option<&'a str>, root: bool) -> Self {
        Frame::Object {
            entries: map.iter(),
            label,
            root,
        }
    }

    fn array(items: &'a [JsonValue], key: Cow<'a, str>) -> Self {
        Frame::Array {
            items: items.iter().enumerate(),
            key,
        }
    }
}

enum Step<'a> {
    Pop,
    Field {
        key: &'a str,
        value: &'a JsonValue,
        label: Option<&'a str>,
        root: bool,
    },
    Element {
        key: String,
        value: &'a JsonValue,
    },
}

impl<'a> Flatten<'a> {
    fn new(record: &'a Record) -> Self {
        Self {
            record_id: record.id(),
            id_field: record.id_field(),
            stack: vec![Frame::object(record.fields(), None, true)],
        }
    }

    fn row(&self, key: &str, value: &JsonValue) -> FlatRow {
        FlatRow::new(self.record_id, key, render_scalar(value))
    }
}

impl Iterator for Flatten<'_> {
    type Item = FlatRow;

    fn next(&mut self) -> Option<FlatRow> {
        loop {
            let step = match self.stack.last_mut()? {
                Frame::Object {
                    entries,
                    label,
                    root,
                } => match entries.next() {
                    Some((key, value)) => Step::Field {
                        key: key.as_str(),
                        value,
                        label: *label,
                        root: *root,
                    },
                    None => Step::Pop,
                },
                // Array positions are 1-based
                Frame::Array { items, key } => match items.next() {
                    Some((index, value)) => Step::Element {
                        key: format!("{key}_{}", index + 1),
                        value,
                    },
                    None => Step::Pop,
                },
            };

            match step {
                Step::Pop => {
                    self.stack.pop();
                }
                Step::Field {
                    key,
                    value,
                    label,
                    root,
                } => {
                    // the identifier is already the row's record_id column
                    if root && key == self.id_field {
                        continue;
                    }
                    match value {
                        JsonValue::Object(map) => {
                            self.stack.push(Frame::object(map, Some(key), false));
                        }
                        JsonValue::Array(items) => {
                            self.stack.push(Frame::array(items, Cow::Borrowed(key)));
                        }
                        scalar => {
                            let row = match label {
                                Some(label) => self.row(&format!("{label}.{key}"), scalar),
                                None => self.row(key, scalar),
                            };
                            return Some(row);
                        }
                    }
                }
                Step::Element { key, value } => match value {
                    // object elements are flattened bare, as if top-level
                    JsonValue::Object(map) => {
                        self.stack.push(Frame::object(map, None, false));
                    }
                    JsonValue::Array(items) => {
                        self.stack.push(Frame::array(items, Cow::Owned(key)));
                    }
                    scalar => return Some(self.row(&key, scalar)),
                },
            }
        }
    }
}
