//! HTTP client for the collection endpoint
//!
//! Provides:
//! - Bearer-authenticated GET requests against a fixed API host
//! - Optional rate limiting between page requests
//! - A response body reader that can resume after a connection reset

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::AccessCredential;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::{debug, warn};

/// Sends page requests for the paginator
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// Issue the request for `path` and return its unread body
    ///
    /// Non-success statuses are errors; the body is not read yet.
    async fn send(&self, path: &str, credential: &AccessCredential)
        -> Result<Box<dyn PageBody>>;
}

/// The body of one page response
#[async_trait]
pub trait PageBody: Send {
    /// Read the full body as text
    ///
    /// May be called again after a failure; it continues on the same
    /// response instead of issuing a new request.
    async fn read(&mut self) -> Result<String>;
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests (the API host)
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com".to_string(),
            timeout: Duration::from_secs(120),
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("dirflat/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client for the collection endpoint
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// The configured API host
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Make an authenticated GET request
    pub async fn get(&self, path: &str, credential: &AccessCredential) -> Result<Response> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let full_url = self.build_url(path);
        let mut req = self.client.get(&full_url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let response = req.bearer_auth(credential.token()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        debug!("Request succeeded: GET {}", full_url);
        Ok(response)
    }
}

#[async_trait]
impl PageTransport for HttpClient {
    async fn send(
        &self,
        path: &str,
        credential: &AccessCredential,
    ) -> Result<Box<dyn PageBody>> {
        let response = self.get(path, credential).await?;
        Ok(Box::new(ResponseBody::new(response)))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Incrementally read response body
///
/// Bytes already received are kept across failed reads, so a retry
/// continues from where the connection dropped. Once a reset has been seen,
/// a stream that ends short of the declared length is still a reset: the
/// body is only returned when it is known to be complete.
pub struct ResponseBody {
    response: Response,
    buffer: Vec<u8>,
    expected: Option<u64>,
    reset_seen: bool,
    complete: bool,
}

impl ResponseBody {
    /// Wrap a response whose body has not been read
    pub fn new(response: Response) -> Self {
        let expected = response.content_length();
        Self {
            response,
            buffer: Vec::new(),
            expected,
            reset_seen: false,
            complete: false,
        }
    }

    /// Bytes received so far
    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    fn truncated(&self) -> Option<String> {
        let received = self.buffer.len() as u64;
        match self.expected {
            Some(expected) if received < expected => Some(format!(
                "body ended after {received} of {expected} bytes"
            )),
            Some(_) => None,
            None if self.reset_seen => Some(format!(
                "body ended after {received} bytes on a dropped connection"
            )),
            None => None,
        }
    }
}

#[async_trait]
impl PageBody for ResponseBody {
    async fn read(&mut self) -> Result<String> {
        while !self.complete {
            match self.response.chunk().await {
                Ok(Some(chunk)) => self.buffer.extend_from_slice(&chunk),
                Ok(None) => {
                    if let Some(message) = self.truncated() {
                        self.reset_seen = true;
                        warn!(received = self.buffer.len(), "{message}");
                        return Err(Error::transport_reset(message));
                    }
                    self.complete = true;
                }
                Err(e) => {
                    let received = self.buffer.len();
                    if self.reset_seen || is_transport_reset(&e) {
                        self.reset_seen = true;
                        warn!(received, "Connection dropped while reading body: {e}");
                        return Err(Error::transport_reset(e.to_string()));
                    }
                    return Err(Error::body_read(e.to_string()));
                }
            }
        }

        String::from_utf8(self.buffer.clone())
            .map_err(|e| Error::body_read(format!("response body is not UTF-8: {e}")))
    }
}

/// Check whether a body read failed because the transport went away
///
/// reqwest reports every failed chunk as a decode error, so the cause chain
/// decides: an incomplete message from hyper or a connection-level I/O error
/// is a reset, anything else is not.
fn is_transport_reset(err: &reqwest::Error) -> bool {
    err.is_timeout() || caused_by_reset(err)
}

pub(crate) fn caused_by_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(inner) = current {
        if let Some(hyper_err) = inner.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_timeout() {
                return true;
            }
        }
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::TimedOut
            ) {
                return true;
            }
        }
        current = inner.source();
    }
    false
}
