//! Page fetch loop
//!
//! Drives `FETCHING → PROCESSING → ADVANCING` until the collection has no
//! continuation cursor. A transport reset while reading a body moves to
//! `RETRYING(n)`, which re-reads the same response; reaching the retry bound
//! ends the run in `FAILED`.

use super::cursor::normalize_cursor;
use super::types::{FetchState, Page, PageConfig, RetryPolicy, RunSummary, Terminal};
use crate::auth::{AccessCredential, TokenProvider};
use crate::error::{Error, Result};
use crate::http::{PageBody, PageTransport};
use crate::status::{StatusEvent, StatusNotifier, TracingNotifier};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for a paginated pull
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    /// API host prefix stripped from next-page links
    pub api_base: String,
    /// Page layout
    pub page: PageConfig,
    /// Body re-read policy
    pub retry: RetryPolicy,
}

impl Default for PaginatorConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.microsoft.com".to_string(),
            page: PageConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Sequential page fetcher
pub struct Paginator {
    transport: Arc<dyn PageTransport>,
    tokens: Arc<dyn TokenProvider>,
    notifier: Arc<dyn StatusNotifier>,
    config: PaginatorConfig,
}

impl Paginator {
    /// Create a paginator that reports to the tracing log
    pub fn new(
        transport: Arc<dyn PageTransport>,
        tokens: Arc<dyn TokenProvider>,
        config: PaginatorConfig,
    ) -> Self {
        Self {
            transport,
            tokens,
            notifier: Arc::new(TracingNotifier),
            config,
        }
    }

    /// Set the status notifier
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn StatusNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    /// Fetch every page starting at `initial_path`
    ///
    /// `on_page` receives each page in order and returns the number of rows
    /// it wrote. It runs to completion before the next request is sent.
    ///
    /// Returns `Ok` with `Terminal::Failed` when body reads exhaust the retry
    /// bound. Every other failure is returned as `Err`.
    pub async fn run<F>(&self, initial_path: &str, mut on_page: F) -> Result<RunSummary>
    where
        F: FnMut(Page) -> Result<u64>,
    {
        let mut summary = RunSummary::default();
        let mut path = initial_path.to_string();
        let mut credential = Some(self.acquire(&mut summary).await?);
        let mut body: Option<Box<dyn PageBody>> = None;
        let mut text: Option<String> = None;
        let mut next_link: Option<String> = None;
        let mut state = FetchState::Fetching;

        loop {
            debug!(?state, page = summary.pages + 1, "Paginator state");

            state = match state {
                FetchState::Fetching => {
                    // a credential serves exactly one fetch
                    let cred = credential
                        .take()
                        .ok_or_else(|| Error::auth("no credential for page request"))?;
                    let mut pending = self.transport.send(&path, &cred).await?;
                    summary.fetches += 1;

                    match pending.read().await {
                        Ok(page_text) => {
                            text = Some(page_text);
                            FetchState::Processing
                        }
                        Err(e) if e.is_transport_reset() => {
                            self.notify_retrying(1, &e);
                            body = Some(pending);
                            FetchState::Retrying(1)
                        }
                        Err(e) => return Err(e),
                    }
                }

                FetchState::Retrying(failures) => {
                    if failures >= self.config.retry.max_attempts {
                        self.notifier
                            .notify(&StatusEvent::SelfTerminated { attempts: failures });
                        summary.terminal = Terminal::Failed { attempts: failures };
                        FetchState::Failed
                    } else {
                        let delay = self.config.retry.delay_for(failures);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }

                        let pending = body
                            .as_mut()
                            .ok_or_else(|| Error::body_read("no response to re-read"))?;
                        summary.retries += 1;

                        match pending.read().await {
                            Ok(page_text) => {
                                self.notifier
                                    .notify(&StatusEvent::SelfHealed { attempts: failures });
                                drop(body.take());
                                text = Some(page_text);
                                FetchState::Processing
                            }
                            Err(e) if e.is_transport_reset() => {
                                self.notify_retrying(failures + 1, &e);
                                FetchState::Retrying(failures + 1)
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }

                FetchState::Processing => {
                    let page_text = text
                        .take()
                        .ok_or_else(|| Error::body_read("no page body to process"))?;
                    let page = Page::decode(&page_text, &self.config.page)?;
                    drop(page_text);

                    let record_count = page.records.len();
                    next_link = page.next_link.clone();

                    let rows = on_page(page)?;
                    summary.pages += 1;
                    summary.records += record_count as u64;
                    summary.rows += rows;

                    self.notifier.notify(&StatusEvent::PageProcessed {
                        page: summary.pages,
                        records: record_count,
                    });
                    FetchState::Advancing
                }

                FetchState::Advancing => match next_link.take() {
                    Some(link) => {
                        path = normalize_cursor(&link, &self.config.api_base)?;
                        debug!(%path, "Following next page link");
                        credential = Some(self.acquire(&mut summary).await?);
                        FetchState::Fetching
                    }
                    None => FetchState::Done,
                },

                FetchState::Done => {
                    info!(
                        pages = summary.pages,
                        records = summary.records,
                        rows = summary.rows,
                        "Pagination complete"
                    );
                    summary.terminal = Terminal::Done;
                    return Ok(summary);
                }

                FetchState::Failed => return Ok(summary),
            };
        }
    }

    async fn acquire(&self, summary: &mut RunSummary) -> Result<AccessCredential> {
        let credential = self.tokens.get_token().await?;
        summary.credentials += 1;
        Ok(credential)
    }

    fn notify_retrying(&self, attempt: u32, err: &Error) {
        self.notifier.notify(&StatusEvent::Retrying {
            attempt,
            max_attempts: self.config.retry.max_attempts,
            reason: err.to_string(),
        });
    }
}

impl std::fmt::Debug for Paginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paginator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
