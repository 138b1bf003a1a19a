//! Crawler module for catalog page fetching and aggregation
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with jitter and retry logic
//! - HTML parsing into dataset records
//! - The shared rate gate and its backoff cycle
//! - Overall harvest coordination

mod backoff;
mod context;
mod coordinator;
mod fetcher;
mod gate;
mod identity;
mod parser;

#[cfg(test)]
mod testing;

pub use context::SharedFetchContext;
pub use coordinator::Coordinator;
pub use fetcher::{
    attempt_page, build_http_client, classify_response, fetch_page, BlockSignal, FailureCause,
    FetchOutcome, FetchedPage, HttpClient, HttpResponse, ReqwestClient,
};
pub use gate::{GatePermit, RateGate};
pub use identity::{
    identity_provider, BrowserIdentityGenerator, ClientIdentity, FixedIdentity, IdentityProvider,
};
pub use parser::{CatalogParser, PageParser, Record, UNKNOWN_ORGANIZATION};

use crate::config::Config;
use crate::output::open_sink;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Build the HTTP client and identity source
/// 2. Open the configured progress sink
/// 3. Discover the page count and fetch every page
/// 4. Persist and return the aggregated records
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::Config;
/// use catalog_harvest::crawler::harvest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let records = harvest(Config::default()).await?;
/// println!("{} datasets", records.len());
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: Config) -> Result<Vec<Record>, HarvestError> {
    let coordinator = build_coordinator(&config)?;
    coordinator.run().await
}

/// Wires the production client, parser, identities and sink into a coordinator
pub fn build_coordinator(config: &Config) -> Result<Coordinator<ReqwestClient>, HarvestError> {
    let client = ReqwestClient::new(&config.crawler)?;
    let parser = CatalogParser::new()?;
    let sink = open_sink(&config.output)?;

    Coordinator::new(
        config.crawler.clone(),
        client,
        identity_provider(&config.identity),
        Box::new(parser),
        sink,
    )
}
