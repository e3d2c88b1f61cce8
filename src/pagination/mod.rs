//! Pagination module
//!
//! Follows `@odata.nextLink`-style cursors across an unbounded number of
//! pages.
//!
//! # Overview
//!
//! - A fresh credential is acquired before every page request.
//! - Pages are processed strictly in order; the next request is not sent
//!   until the caller has written the current page.
//! - A transport reset while reading a body is retried on the same response
//!   up to the configured bound (5 by default). Any other failure is fatal.

mod cursor;
mod paginator;
mod types;

pub use cursor::normalize_cursor;
pub use paginator::{Paginator, PaginatorConfig};
pub use types::{FetchState, Page, PageConfig, RetryPolicy, RunSummary, Terminal};
