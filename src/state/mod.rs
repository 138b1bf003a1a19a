//! State module for tracking harvest progress
//!
//! This module provides the shared state observed by fetch tasks during a run.
//!
//! # Components
//!
//! - `GateState`: The pause gate's `Open -> Closing -> Cooling -> Open` cycle
//! - `AggregatedCollection`: Completion-ordered records gathered so far
//! - `HarvestProgress`: Atomic counters for progress reporting and statistics

mod collection;
mod gate_state;
mod progress;

// Re-export main types
pub use collection::AggregatedCollection;
pub use gate_state::GateState;
pub use progress::HarvestProgress;
