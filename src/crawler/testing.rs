//! Test doubles shared by the crawler unit tests

use crate::config::CrawlerConfig;
use crate::crawler::context::SharedFetchContext;
use crate::crawler::fetcher::{HttpClient, HttpResponse};
use crate::crawler::identity::{BrowserIdentityGenerator, ClientIdentity};
use crate::crawler::parser::{CatalogParser, Record};
use crate::output::{ProgressSink, SinkError};
use crate::TransportError;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// One scripted reply, consumed before falling back to the page body
#[derive(Debug, Clone)]
pub enum Scripted {
    Status(u16),
    Transport(TransportError),
}

/// In-memory `HttpClient` serving canned listing pages
#[derive(Debug, Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<u32, VecDeque<Scripted>>>,
    pages: HashMap<u32, String>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<(u32, String)>>,
    resets: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies to play for `page` before its body is served
    pub fn script(self, page: u32, replies: Vec<Scripted>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .extend(replies);
        self
    }

    /// Body served with 200 for `page`; unknown pages get a 404
    pub fn page(mut self, page: u32, body: String) -> Self {
        self.pages.insert(page, body);
        self
    }

    /// Simulated time spent on the wire per request
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn requests_for(&self, page: u32) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == page)
            .count()
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, ua)| ua.clone())
            .collect()
    }

    fn reply(&self, page: u32) -> Result<HttpResponse, TransportError> {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(Scripted::Status(status)) => Ok(HttpResponse {
                status,
                retry_after: None,
                body: String::new(),
            }),
            Some(Scripted::Transport(e)) => Err(e),
            None => Ok(match self.pages.get(&page) {
                Some(body) => HttpResponse {
                    status: 200,
                    retry_after: None,
                    body: body.clone(),
                },
                None => HttpResponse {
                    status: 404,
                    retry_after: None,
                    body: String::new(),
                },
            }),
        }
    }
}

impl HttpClient for ScriptedClient {
    async fn get(
        &self,
        url: &str,
        identity: &ClientIdentity,
    ) -> Result<HttpResponse, TransportError> {
        let page = page_of(url);
        self.requests
            .lock()
            .unwrap()
            .push((page, identity.user_agent.clone()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.reply(page)
    }

    fn reset_session(&self) -> Result<(), TransportError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn page_of(url: &str) -> u32 {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "page")
                .and_then(|(_, v)| v.parse().ok())
        })
        .unwrap_or(1)
}

/// Sink remembering every snapshot it was handed
#[derive(Debug, Default)]
pub struct RecordingSink {
    snapshots: Mutex<Vec<Vec<Record>>>,
    fail: AtomicBool,
}

impl RecordingSink {
    /// Makes the next persist call fail
    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn persist_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    pub fn last_snapshot(&self) -> Vec<Record> {
        self.snapshots
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

impl ProgressSink for RecordingSink {
    fn persist(&self, records: &[Record]) -> Result<(), SinkError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.snapshots.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

pub fn test_crawler_config(concurrency: u32) -> CrawlerConfig {
    CrawlerConfig {
        base_url: "https://catalog.test/dataset".to_string(),
        max_concurrent_requests: concurrency,
        cooldown_ms: 80_000,
        max_cooldown_ms: 600_000,
        jitter_min_ms: 200,
        jitter_max_ms: 800,
        transport_retry_delay_ms: 1_000,
        transport_retry_max_ms: 30_000,
        escalate_after: 3,
        request_timeout_secs: 30,
        connect_timeout_secs: 10,
        max_pages: 100_000,
        nominal_page_size: 20,
        progress_every: 1,
    }
}

pub fn test_context_with_sink(
    client: ScriptedClient,
    config: CrawlerConfig,
) -> (SharedFetchContext<ScriptedClient>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let ctx = SharedFetchContext::new(
        config,
        client,
        Box::new(BrowserIdentityGenerator::new()),
        Box::new(CatalogParser::new().unwrap()),
        sink.clone(),
    )
    .unwrap();
    (ctx, sink)
}

pub fn test_context(
    client: ScriptedClient,
    config: CrawlerConfig,
) -> SharedFetchContext<ScriptedClient> {
    test_context_with_sink(client, config).0
}

pub fn record(title: &str) -> Record {
    Record {
        title: title.to_string(),
        organization: "federal".to_string(),
        description: format!("About {}", title),
        resources: vec![format!("https://data.test/{}.csv", title)],
    }
}

/// A listing page with `count` datasets and pagination up to `total_pages`
pub fn listing_page(prefix: &str, count: usize, total_pages: u32) -> String {
    let items: String = (0..count)
        .map(|i| {
            format!(
                r#"<li class="dataset-item has-organization"><div class="dataset-content">
                <h3 class="dataset-heading"><a href="/dataset/{p}-{i}">{p}-{i}</a></h3>
                <div class="organization-type-wrap"><span class="organization-type" data-organization-type="federal">Federal</span></div>
                <div class="notes">Dataset {p}-{i}</div>
                <ul class="dataset-resources unstyled"><li><a href="https://data.test/{p}-{i}.csv">CSV</a></li></ul>
                </div></li>"#,
                p = prefix,
                i = i
            )
        })
        .collect();

    let markers: String = if total_pages > 1 {
        (1..=total_pages)
            .map(|n| format!(r#"<li class="page-item"><a class="page-link">{}</a></li>"#, n))
            .collect()
    } else {
        String::new()
    };

    format!(
        r#"<html><body><section class="module">
        <ul class="dataset-list unstyled">{}</ul>
        <div class="pagination-wrapper"><ul class="pagination">{}</ul></div>
        </section></body></html>"#,
        items, markers
    )
}
