//! HTTP client module
//!
//! Provides the transport the paginator drives.
//!
//! # Features
//!
//! - **Bearer requests**: GET against the configured API host
//! - **Resumable body reads**: a failed read keeps the bytes received so far
//! - **Rate Limiting**: optional token bucket pacing using governor

mod client;
mod rate_limit;

pub use client::{
    HttpClient, HttpClientConfig, HttpClientConfigBuilder, PageBody, PageTransport, ResponseBody,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
