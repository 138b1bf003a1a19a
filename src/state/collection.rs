use crate::crawler::Record;
use tokio::sync::RwLock;

/// Completion-ordered, append-only collection of harvested records
///
/// Only the coordinator's completion loop appends; the backoff cycle takes
/// snapshots of it for the progress sink.
#[derive(Debug, Default)]
pub struct AggregatedCollection {
    records: RwLock<Vec<Record>>,
}

impl AggregatedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one page worth of records and returns the new length
    pub async fn append(&self, records: Vec<Record>) -> usize {
        let mut guard = self.records.write().await;
        guard.extend(records);
        guard.len()
    }

    /// Clones the current contents
    pub async fn snapshot(&self) -> Vec<Record> {
        self.records.read().await.clone()
    }
}
