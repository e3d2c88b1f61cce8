//! Pagination types
//!
//! Page decoding, the fetch state machine's states, retry policy and the
//! run summary.

use crate::error::{Error, Result};
use crate::flatten::Record;
use crate::types::{BackoffType, JsonValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where records, cursor and identifier live in a page response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Field holding the array of records
    pub records_field: String,
    /// Field holding the absolute next-page URL
    pub next_link_field: String,
    /// Record field holding the unique identifier
    pub id_field: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            records_field: "value".to_string(),
            next_link_field: "@odata.nextLink".to_string(),
            id_field: "id".to_string(),
        }
    }
}

/// One decoded page response
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records in arrival order
    pub records: Vec<Record>,
    /// Absolute URL of the next page, if any
    pub next_link: Option<String>,
}

impl Page {
    /// Decode a page body
    ///
    /// Fails on invalid JSON, a missing or non-array records field, a
    /// non-string cursor, or any record without an identifier.
    pub fn decode(body: &str, config: &PageConfig) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(body)
            .map_err(|e| Error::malformed(format!("page is not valid JSON: {e}")))?;

        let JsonValue::Object(mut fields) = value else {
            return Err(Error::malformed("page is not a JSON object"));
        };

        let records = match fields.remove(&config.records_field) {
            Some(JsonValue::Array(items)) => items,
            Some(_) => {
                return Err(Error::malformed(format!(
                    "'{}' is not an array",
                    config.records_field
                )))
            }
            None => {
                return Err(Error::malformed(format!(
                    "page has no '{}' field",
                    config.records_field
                )))
            }
        };

        let next_link = match fields.remove(&config.next_link_field) {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(link)) if link.is_empty() => None,
            Some(JsonValue::String(link)) => Some(link),
            Some(_) => {
                return Err(Error::malformed(format!(
                    "'{}' is not a string",
                    config.next_link_field
                )))
            }
        };

        let records = records
            .into_iter()
            .map(|item| Record::from_value(item, &config.id_field))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { records, next_link })
    }

    /// Whether another page follows
    pub fn has_next(&self) -> bool {
        self.next_link.is_some()
    }
}

/// States of the page fetch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Requesting the current page and reading its body
    Fetching,
    /// Handing the page's records to the caller
    Processing,
    /// Looking for a continuation cursor
    Advancing,
    /// Re-reading the same response after `n` consecutive resets
    Retrying(u32),
    /// All pages processed
    Done,
    /// Resets exhausted the retry bound
    Failed,
}

impl FetchState {
    /// Whether the loop stops in this state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Bound and pacing for body re-reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive resets at which the run fails
    pub max_attempts: u32,
    /// Backoff shape between re-reads
    pub backoff: BackoffType,
    /// Delay before the first re-read
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Upper bound on any delay
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: BackoffType::Exponential,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given bound and no delay between re-reads
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Delay before re-reading after `failures` consecutive resets
    pub fn delay_for(&self, failures: u32) -> Duration {
        self.backoff.delay(
            failures.saturating_sub(1),
            self.initial_backoff,
            self.max_backoff,
        )
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Terminal {
    /// Every page was processed
    #[default]
    Done,
    /// A page body could not be read after `attempts` consecutive resets
    Failed {
        /// Consecutive resets
        attempts: u32,
    },
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Requests issued (one per page)
    pub fetches: u64,
    /// Pages handed to the caller
    pub pages: u64,
    /// Records handed to the caller
    pub records: u64,
    /// Rows the caller reported writing
    pub rows: u64,
    /// Credentials acquired
    pub credentials: u64,
    /// Body re-reads after resets
    pub retries: u64,
    /// Terminal state
    pub terminal: Terminal,
}

impl RunSummary {
    /// Whether the run reached `Done`
    pub fn is_done(&self) -> bool {
        self.terminal == Terminal::Done
    }
}
