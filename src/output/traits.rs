//! Progress sink trait and errors
//!
//! A sink receives the whole aggregated collection, once per cooldown cycle
//! and once at the end of a harvest. Each call replaces what the previous
//! call stored.

use crate::crawler::Record;
use thiserror::Error;

/// Errors that can occur while persisting a collection
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Sink lock poisoned: {0}")]
    Poisoned(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for collection snapshots
///
/// Implementations are called from a blocking thread and must be thread-safe.
pub trait ProgressSink: Send + Sync {
    /// Stores `records`, replacing any earlier snapshot
    fn persist(&self, records: &[Record]) -> SinkResult<()>;
}
