//! Status notifications
//!
//! Operational messages emitted during a run: start and end, per-page record
//! counts, body re-reads, recovery, self-termination and fatal errors.
//! Notifiers only observe; they cannot slow down or stop a run.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// A status message for the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Run started
    RunStarted {
        /// Start time
        at: DateTime<Utc>,
    },
    /// A page was flattened and written
    PageProcessed {
        /// 1-based page number
        page: u64,
        /// Records on the page
        records: usize,
    },
    /// Body read failed with a transport reset; reading again
    Retrying {
        /// Consecutive failures so far
        attempt: u32,
        /// Failure bound
        max_attempts: u32,
        /// Transport error text
        reason: String,
    },
    /// Body read succeeded after one or more resets
    SelfHealed {
        /// Failures before the successful read
        attempts: u32,
    },
    /// Retries exhausted; the run stops
    SelfTerminated {
        /// Consecutive failures
        attempts: u32,
    },
    /// Run finished
    RunFinished {
        /// Finish time
        at: DateTime<Utc>,
        /// Pages fetched
        pages: u64,
        /// Records processed
        records: u64,
    },
    /// Run aborted with an error
    Fatal {
        /// Error text
        message: String,
    },
}

impl StatusEvent {
    /// Whether this event reports a problem
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Self::Retrying { .. } | Self::SelfTerminated { .. } | Self::Fatal { .. }
        )
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RunStarted { at } => write!(f, "Run started at {}", at.to_rfc3339()),
            Self::PageProcessed { page, records } => {
                write!(f, "Page {page}: processed {records} records")
            }
            Self::Retrying {
                attempt,
                max_attempts,
                reason,
            } => write!(
                f,
                "Connection reset while reading page ({attempt}/{max_attempts}), reading again: {reason}"
            ),
            Self::SelfHealed { attempts } => {
                write!(f, "Self-healed after {attempts} connection resets")
            }
            Self::SelfTerminated { attempts } => write!(
                f,
                "Self-terminating after {attempts} consecutive connection resets"
            ),
            Self::RunFinished { at, pages, records } => write!(
                f,
                "Run finished at {}: {records} records in {pages} pages",
                at.to_rfc3339()
            ),
            Self::Fatal { message } => write!(f, "Run failed: {message}"),
        }
    }
}

/// Receives status events
pub trait StatusNotifier: Send + Sync {
    /// Deliver one event
    fn notify(&self, event: &StatusEvent);
}

/// Notifier that writes events to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl StatusNotifier for TracingNotifier {
    fn notify(&self, event: &StatusEvent) {
        match event {
            StatusEvent::Fatal { .. } | StatusEvent::SelfTerminated { .. } => {
                error!(target: "dirflat::status", "{event}");
            }
            StatusEvent::Retrying { .. } => warn!(target: "dirflat::status", "{event}"),
            _ => info!(target: "dirflat::status", "{event}"),
        }
    }
}

/// Notifier that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl StatusNotifier for RecordingNotifier {
    fn notify(&self, event: &StatusEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
