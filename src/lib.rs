// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # dirflat
//!
//! Pulls every user from a paginated directory (Graph) API and flattens each
//! record into `(record_id, key, value)` rows in a tab-delimited file.
//!
//! ## Features
//!
//! - **Client credentials auth**: a fresh token for every page request
//! - **Link pagination**: follows `@odata.nextLink` until the last page
//! - **Body re-reads**: a reset mid-body re-reads the same response, bounded
//! - **Flattening**: dotted keys for objects, positional suffixes for arrays
//! - **Row files**: timestamped TSV output with an optional JSON rendition
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dirflat::cli::extract;
//! use dirflat::config::ExtractConfig;
//! use dirflat::status::TracingNotifier;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> dirflat::Result<()> {
//!     let config = ExtractConfig::from_file("extract.yaml")?;
//!     let report = extract(&config, Arc::new(TracingNotifier)).await?;
//!     println!("{} rows in {}", report.summary.rows, report.output.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   token    ┌────────────┐   page text   ┌───────────┐
//! │   Auth   │──────────▶ │ Paginator  │─────────────▶ │  Flatten  │
//! └──────────┘            │ (fetch /   │               └─────┬─────┘
//! ┌──────────┐  response  │  retry /   │                     │ rows
//! │   HTTP   │──────────▶ │  advance)  │               ┌─────▼─────┐
//! └──────────┘            └─────┬──────┘               │  Output   │
//!                               │ events               │ TSV/JSON  │
//!                         ┌─────▼──────┐               └───────────┘
//!                         │   Status   │
//!                         └────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Token acquisition
pub mod auth;

/// HTTP client with rate limiting and resumable bodies
pub mod http;

/// Page fetch state machine
pub mod pagination;

/// Record flattening
pub mod flatten;

/// Operator status notifications
pub mod status;

/// Row file output
pub mod output;

/// Extraction configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::ExtractConfig;
pub use flatten::{flatten, FlatRow, Record};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
