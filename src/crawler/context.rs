//! Shared state handed to every fetch task
//!
//! `SharedFetchContext` bundles the gate, transport, identity, parser, sink and
//! counters that all fetchers of a run observe. Identity and gate state are
//! only ever written by the backoff cycle; fetchers only read them.

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::HttpClient;
use crate::crawler::gate::RateGate;
use crate::crawler::identity::{ClientIdentity, IdentityProvider};
use crate::crawler::parser::PageParser;
use crate::output::ProgressSink;
use crate::state::{AggregatedCollection, HarvestProgress};
use crate::HarvestError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

pub struct SharedFetchContext<C> {
    pub(crate) config: CrawlerConfig,
    base_url: Url,
    pub(crate) gate: RateGate,
    pub(crate) client: C,
    identity: RwLock<Arc<ClientIdentity>>,
    identity_generation: AtomicU64,
    identities: Box<dyn IdentityProvider>,
    pub(crate) parser: Box<dyn PageParser>,
    pub(crate) sink: Arc<dyn ProgressSink>,
    pub(crate) collection: Arc<AggregatedCollection>,
    pub(crate) progress: Arc<HarvestProgress>,
}

impl<C: HttpClient> SharedFetchContext<C> {
    /// Creates a context with an open gate and a first identity from `identities`
    pub fn new(
        config: CrawlerConfig,
        client: C,
        identities: Box<dyn IdentityProvider>,
        parser: Box<dyn PageParser>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.base_url)?;
        let gate = RateGate::new(config.max_concurrent_requests as usize);
        let identity = Arc::new(identities.next_identity());

        Ok(Self {
            config,
            base_url,
            gate,
            client,
            identity: RwLock::new(identity),
            identity_generation: AtomicU64::new(0),
            identities,
            parser,
            sink,
            collection: Arc::new(AggregatedCollection::new()),
            progress: Arc::new(HarvestProgress::new()),
        })
    }

    /// URL of a catalog page
    pub fn page_url(&self, page: u32) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("page", &page.to_string());
        url.into()
    }

    /// Identity to use for the next request
    pub fn current_identity(&self) -> Arc<ClientIdentity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of rotations performed so far
    pub fn identity_generation(&self) -> u64 {
        self.identity_generation.load(Ordering::SeqCst)
    }

    /// Replaces the identity with a fresh one from the provider
    pub(crate) fn rotate_identity(&self) -> Arc<ClientIdentity> {
        let next = Arc::new(self.identities.next_identity());
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        self.identity_generation.fetch_add(1, Ordering::SeqCst);
        next
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    #[cfg(test)]
    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    pub fn progress(&self) -> &Arc<HarvestProgress> {
        &self.progress
    }
}
