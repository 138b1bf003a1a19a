//! Harvest coordinator - main orchestration logic
//!
//! This module drives a complete harvest:
//! - Discovering the page count from the first page
//! - Fanning out one fetch task per remaining page
//! - Aggregating records in completion order
//! - Persisting the final collection

use crate::config::CrawlerConfig;
use crate::crawler::context::SharedFetchContext;
use crate::crawler::fetcher::{fetch_page, HttpClient};
use crate::crawler::identity::IdentityProvider;
use crate::crawler::parser::{PageParser, Record};
use crate::output::{HarvestStatistics, ProgressSink};
use crate::HarvestError;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Main harvest coordinator structure
pub struct Coordinator<C> {
    ctx: Arc<SharedFetchContext<C>>,
}

impl<C: HttpClient> Coordinator<C> {
    /// Creates a coordinator with a fresh gate, identity and collection
    ///
    /// # Arguments
    ///
    /// * `config` - Crawler settings
    /// * `client` - Transport used for every request
    /// * `identities` - Source of client identities, consulted on every rotation
    /// * `parser` - Record extractor for listing pages
    /// * `sink` - Destination of cooldown snapshots and the final collection
    pub fn new(
        config: CrawlerConfig,
        client: C,
        identities: Box<dyn IdentityProvider>,
        parser: Box<dyn PageParser>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, HarvestError> {
        let ctx = SharedFetchContext::new(config, client, identities, parser, sink)?;
        Ok(Self { ctx: Arc::new(ctx) })
    }

    /// Context shared with the fetch tasks
    pub fn context(&self) -> &Arc<SharedFetchContext<C>> {
        &self.ctx
    }

    /// Runs the harvest to completion
    ///
    /// This is the core orchestration logic that:
    /// 1. Fetches page 1 and reads the page count from it
    /// 2. Spawns a fetch task for every page in `2..=total`
    /// 3. Appends each page's records as soon as its task completes
    /// 4. Persists the final collection through the sink
    ///
    /// Blocking and transient failures are retried inside the tasks and never
    /// surface here; only a task that panicked is reported as an error.
    pub async fn run(&self) -> Result<Vec<Record>, HarvestError> {
        let ctx = &self.ctx;
        tracing::info!("Starting harvest of {}", ctx.config.base_url);

        let first = fetch_page(ctx, 1).await;
        let mut total_pages = first.total_pages.unwrap_or(1).max(1);
        if total_pages > ctx.config.max_pages {
            tracing::warn!(
                "Page 1 reports {} pages, harvesting only the first {}",
                total_pages,
                ctx.config.max_pages
            );
            total_pages = ctx.config.max_pages;
        }
        ctx.progress.set_plan(total_pages, ctx.config.nominal_page_size);
        tracing::info!(
            "Catalog has {} pages, expecting about {} records",
            total_pages,
            ctx.progress.expected_records()
        );

        self.complete_page(first.page, first.records).await;

        let mut tasks = JoinSet::new();
        for page in 2..=total_pages {
            let ctx = ctx.clone();
            tasks.spawn(async move { fetch_page(&ctx, page).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(fetched) => self.complete_page(fetched.page, fetched.records).await,
                Err(e) => {
                    tasks.abort_all();
                    return Err(HarvestError::Task(e));
                }
            }
        }

        let records = ctx.collection.snapshot().await;
        self.persist_final(&records).await;

        tracing::info!(
            "Harvest completed: {} records from {} pages in {:?}",
            records.len(),
            total_pages,
            ctx.progress.started_at().elapsed()
        );

        Ok(records)
    }

    /// Statistics of the run so far, grouped over `records`
    pub fn statistics(&self, records: &[Record]) -> HarvestStatistics {
        HarvestStatistics {
            peak_in_flight: self.ctx.gate.peak_in_flight(),
            ..HarvestStatistics::collect(&self.ctx.progress, records)
        }
    }

    async fn complete_page(&self, page: u32, records: Vec<Record>) {
        let ctx = &self.ctx;
        let count = records.len();
        let collected = ctx.collection.append(records).await;
        let completed = ctx.progress.record_page(count);
        let total = ctx.progress.total_pages();

        tracing::debug!(
            "Page {} contributed {} records ({} in flight, {}/{} slots free)",
            page,
            count,
            ctx.gate.in_flight(),
            ctx.gate.available_slots(),
            ctx.gate.capacity()
        );

        if completed % ctx.config.progress_every.max(1) == 0 || completed == total {
            let elapsed = ctx.progress.started_at().elapsed();
            let rate = completed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {}/{} pages, {}/~{} records, {:.2} pages/sec",
                completed,
                total,
                collected,
                ctx.progress.expected_records(),
                rate
            );
        }
    }

    async fn persist_final(&self, records: &[Record]) {
        let sink = self.ctx.sink.clone();
        let snapshot = records.to_vec();

        match tokio::task::spawn_blocking(move || sink.persist(&snapshot)).await {
            Ok(Ok(())) => tracing::info!("Saved {} records", records.len()),
            Ok(Err(e)) => tracing::error!("Failed to save final collection: {}", e),
            Err(e) => tracing::error!("Final save task failed: {}", e),
        }
    }
}
