//! Page fetcher implementation
//!
//! This module handles every HTTP request of a harvest, including:
//! - The `HttpClient` capability and its reqwest-backed implementation
//! - Classifying responses into fetch outcomes
//! - The gated, jittered retry loop that runs until a page succeeds

use crate::config::CrawlerConfig;
use crate::crawler::context::SharedFetchContext;
use crate::crawler::identity::ClientIdentity;
use crate::crawler::parser::{PageParser, Record};
use crate::{ParseError, TransportError};
use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use std::fmt;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Raw response of one GET request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Delay requested by a `Retry-After` header, in its delta-seconds form
    pub retry_after: Option<Duration>,
    pub body: String,
}

/// Transport capability used by the fetcher
pub trait HttpClient: Send + Sync + 'static {
    /// Issues one GET request carrying the identity's headers
    fn get(
        &self,
        url: &str,
        identity: &ClientIdentity,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    /// Drops connection and session state after an identity rotation
    fn reset_session(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// `HttpClient` backed by a shared reqwest client
#[derive(Debug)]
pub struct ReqwestClient {
    client: RwLock<Client>,
    request_timeout: Duration,
    connect_timeout: Duration,
}

impl ReqwestClient {
    /// Builds a client with the configured request and connect timeouts
    ///
    /// # Example
    ///
    /// ```no_run
    /// use catalog_harvest::config::CrawlerConfig;
    /// use catalog_harvest::crawler::ReqwestClient;
    ///
    /// let client = ReqwestClient::new(&CrawlerConfig::default()).unwrap();
    /// ```
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let request_timeout = config.request_timeout();
        let connect_timeout = config.connect_timeout();
        let client = build_http_client(request_timeout, connect_timeout)?;

        Ok(Self {
            client: RwLock::new(client),
            request_timeout,
            connect_timeout,
        })
    }

    fn current(&self) -> Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Builds the underlying reqwest client
///
/// Identity headers are attached per request, so the client itself carries
/// no user agent.
pub fn build_http_client(
    request_timeout: Duration,
    connect_timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(request_timeout)
        .connect_timeout(connect_timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

impl HttpClient for ReqwestClient {
    async fn get(
        &self,
        url: &str,
        identity: &ClientIdentity,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.current().get(url);
        for (name, value) in identity.headers() {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }

    fn reset_session(&self) -> Result<(), TransportError> {
        let fresh = build_http_client(self.request_timeout, self.connect_timeout)
            .map_err(|e| TransportError::Other(e.to_string()))?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }
}

fn classify_transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// A blocking signal raised by a fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSignal {
    /// Page whose attempt raised the signal
    pub page: u32,
    /// Blocking HTTP status, or `None` when escalated from repeated failures
    pub status: Option<u16>,
    /// Minimum cooldown requested by the server
    pub retry_after: Option<Duration>,
}

impl BlockSignal {
    pub fn escalated(page: u32) -> Self {
        Self {
            page,
            status: None,
            retry_after: None,
        }
    }
}

impl fmt::Display for BlockSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {} on page {}", status, self.page),
            None => write!(f, "repeated failures on page {}", self.page),
        }
    }
}

/// Why a fetch attempt failed without being blocked
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureCause {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Result of a single fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// All records of the page; the page count is only read from page 1
    Success {
        records: Vec<Record>,
        total_pages: Option<u32>,
    },

    /// The server rejected us (403/429)
    Blocked(BlockSignal),

    /// Anything else that went wrong; retried after a short backoff
    TransientFailure(FailureCause),
}

/// A page whose records were finally obtained
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub page: u32,
    pub records: Vec<Record>,
    pub total_pages: Option<u32>,
    /// Attempts it took, including the successful one
    pub attempts: u32,
}

/// Classifies a raw response into a fetch outcome
pub fn classify_response(parser: &dyn PageParser, page: u32, response: HttpResponse) -> FetchOutcome {
    match response.status {
        403 | 429 => FetchOutcome::Blocked(BlockSignal {
            page,
            status: Some(response.status),
            retry_after: response.retry_after,
        }),
        status if !(200..300).contains(&status) => {
            FetchOutcome::TransientFailure(FailureCause::Status(status))
        }
        _ => match parser.parse_records(&response.body) {
            Ok(records) => FetchOutcome::Success {
                records,
                total_pages: (page == 1).then(|| parser.parse_page_count(&response.body)),
            },
            Err(e) => FetchOutcome::TransientFailure(FailureCause::Parse(e)),
        },
    }
}

/// Performs one gated attempt at a page
///
/// The limiter slot is held from admission until the response has been
/// classified, and released on return.
pub async fn attempt_page<C: HttpClient>(ctx: &SharedFetchContext<C>, page: u32) -> FetchOutcome {
    let _permit = ctx.gate.admit().await;

    tokio::time::sleep(jitter_delay(&ctx.config)).await;
    // The gate may have closed while we were sleeping
    ctx.gate.wait_open().await;

    ctx.progress.record_attempt();
    let identity = ctx.current_identity();
    let url = ctx.page_url(page);
    tracing::debug!("GET {}", url);

    match ctx.client.get(&url, &identity).await {
        Ok(response) => classify_response(ctx.parser.as_ref(), page, response),
        Err(e) => FetchOutcome::TransientFailure(FailureCause::Transport(e)),
    }
}

/// Fetches a page until its records are obtained
///
/// # Retry Logic
///
/// | Outcome | Action |
/// |---------|--------|
/// | 2xx, parsed | Return the records |
/// | HTTP 403 / 429 | Run the backoff cycle, then retry |
/// | Other status, transport or parse error | Sleep an exponential, jittered delay, then retry |
/// | `escalate-after` consecutive failures | Run the backoff cycle, then retry |
///
/// There is no retry ceiling: a page that never succeeds keeps this future
/// pending forever.
pub async fn fetch_page<C: HttpClient>(ctx: &SharedFetchContext<C>, page: u32) -> FetchedPage {
    let mut attempts: u32 = 0;
    let mut consecutive_failures: u32 = 0;

    loop {
        attempts += 1;

        match attempt_page(ctx, page).await {
            FetchOutcome::Success {
                records,
                total_pages,
            } => {
                tracing::debug!(
                    "Page {} yielded {} records after {} attempt(s)",
                    page,
                    records.len(),
                    attempts
                );
                return FetchedPage {
                    page,
                    records,
                    total_pages,
                    attempts,
                };
            }

            FetchOutcome::Blocked(signal) => {
                consecutive_failures = 0;
                ctx.progress.record_blocked();
                tracing::warn!("Blocked: {}", signal);
                ctx.handle_block(&signal).await;
            }

            FetchOutcome::TransientFailure(cause) => {
                consecutive_failures += 1;
                ctx.progress.record_transient_failure();

                if consecutive_failures >= ctx.config.escalate_after {
                    tracing::warn!(
                        "Page {} failed {} times in a row ({}), escalating to a cooldown",
                        page,
                        consecutive_failures,
                        cause
                    );
                    consecutive_failures = 0;
                    ctx.handle_block(&BlockSignal::escalated(page)).await;
                } else {
                    let delay = retry_delay(&ctx.config, consecutive_failures);
                    tracing::debug!(
                        "Page {} attempt {} failed ({}), retrying in {:?}",
                        page,
                        attempts,
                        cause,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Uniform random pre-request delay within the configured bounds
pub fn jitter_delay(config: &CrawlerConfig) -> Duration {
    let low = config.jitter_min_ms.min(config.jitter_max_ms);
    let high = config.jitter_min_ms.max(config.jitter_max_ms);
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

/// Backoff delay before retrying the `failures`-th consecutive transient failure
///
/// Doubles from `transport-retry-delay-ms`, capped at `transport-retry-max-ms`,
/// then spread by ±25%.
pub fn retry_delay(config: &CrawlerConfig, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    let base = config
        .transport_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(config.transport_retry_max_ms);

    let factor: f64 = rand::thread_rng().gen_range(0.75..=1.25);
    Duration::from_millis((base as f64 * factor) as u64)
}
