//! Backoff cycle run when the server starts blocking us
//!
//! Exactly one caller at a time drives the cycle. Whoever wins the gate's
//! test-and-close rotates the identity, sleeps out the cooldown, snapshots the
//! collection and reopens the gate; every other caller returns at once and
//! waits at the gate like any other fetcher.

use crate::crawler::context::SharedFetchContext;
use crate::crawler::fetcher::{BlockSignal, HttpClient};
use crate::crawler::gate::RateGate;
use std::time::Duration;

/// Reopens the gate when dropped
///
/// Held for the whole cycle, so the gate cannot stay closed if the cycle's
/// future is dropped or one of its steps panics.
struct ReopenGuard<'a> {
    gate: &'a RateGate,
}

impl Drop for ReopenGuard<'_> {
    fn drop(&mut self) {
        self.gate.open_gate();
    }
}

impl<C: HttpClient> SharedFetchContext<C> {
    /// Reacts to a blocking signal
    ///
    /// Returns `true` if this call ran the cycle, `false` if another cycle was
    /// already in progress.
    pub async fn handle_block(&self, signal: &BlockSignal) -> bool {
        if !self.gate.try_close() {
            tracing::debug!("Gate already closed, not handling {}", signal);
            return false;
        }
        let _reopen = ReopenGuard { gate: &self.gate };

        let identity = self.rotate_identity();
        tracing::info!(
            "Rotated client identity (generation {}): {}",
            self.identity_generation(),
            identity.user_agent
        );
        if let Err(e) = self.client.reset_session() {
            tracing::warn!("Failed to reset HTTP session: {}", e);
        }

        let cooldown = self.cooldown_for(signal);
        self.gate.mark_cooling();
        self.progress.record_cooldown();
        tracing::info!("{}; pausing all fetchers for {:?}", signal, cooldown);
        tokio::time::sleep(cooldown).await;

        self.save_snapshot().await;

        self.gate.open_gate();
        tracing::info!("Cooldown over, resuming fetchers");
        true
    }

    /// Configured cooldown, stretched to honour a longer `Retry-After`
    ///
    /// The requested delay is capped at `max-cooldown-ms`.
    fn cooldown_for(&self, signal: &BlockSignal) -> Duration {
        let configured = self.config.cooldown();
        let ceiling = self.config.max_cooldown().max(configured);
        match signal.retry_after {
            Some(requested) if requested > ceiling => {
                tracing::warn!(
                    "Server asked for a {:?} pause, capping at {:?}",
                    requested,
                    ceiling
                );
                ceiling
            }
            Some(requested) => requested.max(configured),
            None => configured,
        }
    }

    /// Best-effort write of the current collection through the sink
    async fn save_snapshot(&self) {
        let snapshot = self.collection.snapshot().await;
        let count = snapshot.len();
        let sink = self.sink.clone();

        let result = tokio::task::spawn_blocking(move || sink.persist(&snapshot)).await;
        match result {
            Ok(Ok(())) => {
                self.progress.record_snapshot(true);
                tracing::info!("Saved progress snapshot of {} records", count);
            }
            Ok(Err(e)) => {
                self.progress.record_snapshot(false);
                tracing::warn!("Failed to save progress snapshot: {}", e);
            }
            Err(e) => {
                self.progress.record_snapshot(false);
                tracing::warn!("Progress snapshot task failed: {}", e);
            }
        }
    }
}
