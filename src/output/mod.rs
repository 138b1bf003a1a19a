//! Output module for persisting harvested records
//!
//! This module handles:
//! - The progress sink interface used by cooldown snapshots and the final save
//! - JSON and SQLite sink implementations
//! - Harvest statistics

mod json_output;
mod schema;
mod sqlite_output;
pub mod stats;
mod traits;

pub use json_output::{load_records, JsonFileSink};
pub use sqlite_output::SqliteSink;
pub use stats::{print_statistics, HarvestStatistics};
pub use traits::{ProgressSink, SinkError, SinkResult};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;
use std::sync::Arc;

/// Opens the sink selected by the output configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn ProgressSink>)` - Sink ready to accept snapshots
/// * `Err(SinkError)` - The database could not be opened
pub fn open_sink(config: &OutputConfig) -> SinkResult<Arc<dyn ProgressSink>> {
    let path = Path::new(&config.path);
    tracing::info!("Writing {:?} output to {}", config.format, path.display());

    Ok(match config.format {
        OutputFormat::Json => Arc::new(JsonFileSink::new(path)),
        OutputFormat::Sqlite => Arc::new(SqliteSink::new(path)?),
    })
}
