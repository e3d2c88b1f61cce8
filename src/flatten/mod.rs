//! Flatten module
//!
//! Turns one nested JSON record into a lazy sequence of
//! `(record_id, key, value)` rows.
//!
//! # Addressing
//!
//! - A scalar directly under the record keeps its key (`jobTitle`).
//! - A scalar inside a nested object is prefixed with the key of its
//!   *immediately* enclosing object only (`org.level1Name`), never a full
//!   dotted path.
//! - A scalar array element is keyed `<array_key>_<position>`, positions
//!   starting at 1 (`phones_1`).
//! - The fields of an object array element are emitted with bare keys, as if
//!   they sat directly under the record.
//! - `null` is written as `None`.

mod flattener;
mod types;

pub use flattener::{flatten, Flatten};
pub use types::{render_scalar, strip_control, FlatRow, Record, NULL_TEXT};

#[cfg(test)]
mod tests;
