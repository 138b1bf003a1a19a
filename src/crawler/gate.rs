//! Shared admission gate for page fetches
//!
//! The gate combines two mechanisms:
//! - A counting limiter (semaphore) bounding simultaneous in-flight fetches
//! - A pause gate that holds back every fetcher while a backoff cycle runs
//!
//! Only the pre-request wait point observes the pause gate. Requests that are
//! already on the wire when the gate closes are allowed to finish.

use crate::state::GateState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Default)]
struct Occupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
}

/// Admission held by a fetcher for the duration of one attempt
///
/// The limiter slot is released when the permit is dropped, whatever the
/// outcome of the attempt.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
    occupancy: Arc<Occupancy>,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.occupancy.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Concurrency limiter plus global pause gate
#[derive(Debug)]
pub struct RateGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    state: watch::Sender<GateState>,
    occupancy: Arc<Occupancy>,
}

impl RateGate {
    /// Creates an open gate admitting at most `capacity` concurrent fetches
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (state, _) = watch::channel(GateState::Open);

        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            state,
            occupancy: Arc::new(Occupancy::default()),
        }
    }

    /// Waits for a limiter slot, then for the pause gate to be open
    pub async fn admit(&self) -> GatePermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("rate gate semaphore is never closed");

        self.wait_open().await;

        let current = self.occupancy.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.occupancy.peak.fetch_max(current, Ordering::SeqCst);

        GatePermit {
            _permit: permit,
            occupancy: self.occupancy.clone(),
        }
    }

    /// Suspends until the pause gate is open
    pub async fn wait_open(&self) {
        let mut rx = self.state.subscribe();
        if rx.borrow().is_closed() {
            tracing::trace!("Gate is {}, waiting for it to reopen", *rx.borrow());
        }
        // The sender lives as long as the gate, so this only returns once open
        let _ = rx.wait_for(GateState::is_open).await;
    }

    /// Atomically moves the gate from `Open` to `Closing`
    ///
    /// Returns `true` only for the single caller that performed the
    /// transition; everyone else sees an already-closed gate.
    pub fn try_close(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_open() {
                *state = GateState::Closing;
                true
            } else {
                false
            }
        })
    }

    /// Closes the gate if it is open; no-op otherwise
    pub fn close_gate(&self) {
        self.try_close();
    }

    /// Moves a closing gate into the cooldown phase
    pub fn mark_cooling(&self) {
        self.state.send_if_modified(|state| {
            if state.can_transition_to(GateState::Cooling) {
                *state = GateState::Cooling;
                true
            } else {
                false
            }
        });
    }

    /// Reopens the gate and wakes every waiting fetcher; no-op if already open
    pub fn open_gate(&self) {
        self.state.send_if_modified(|state| {
            if state.is_closed() {
                *state = GateState::Open;
                true
            } else {
                false
            }
        });
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Watches gate state changes
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Limiter slots not currently held
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Fetchers currently past the admission point
    pub fn in_flight(&self) -> usize {
        self.occupancy.current.load(Ordering::SeqCst)
    }

    /// Highest number of fetchers ever simultaneously past the admission point
    pub fn peak_in_flight(&self) -> usize {
        self.occupancy.peak.load(Ordering::SeqCst)
    }
}
