//! SQLite-based progress sink
//!
//! Each persist replaces the `datasets` and `dataset_resources` tables inside
//! one transaction and appends a row to `snapshots`.

use crate::crawler::Record;
use crate::output::schema::initialize_schema;
use crate::output::traits::{ProgressSink, SinkError, SinkResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite sink
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Loads the records of the latest snapshot, in collection order
    pub fn load_records(&self) -> SinkResult<Vec<Record>> {
        let conn = self.lock()?;

        let mut datasets = conn.prepare(
            "SELECT id, title, organization, description FROM datasets ORDER BY position",
        )?;
        let mut resources = conn
            .prepare("SELECT url FROM dataset_resources WHERE dataset_id = ?1 ORDER BY position")?;

        let rows = datasets.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Record {
                    title: row.get(1)?,
                    organization: row.get(2)?,
                    description: row.get(3)?,
                    resources: Vec::new(),
                },
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, mut record) = row?;
            record.resources = resources
                .query_map(params![id], |r| r.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            records.push(record);
        }

        Ok(records)
    }

    /// Number of snapshots persisted so far
    pub fn snapshot_count(&self) -> SinkResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn lock(&self) -> SinkResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SinkError::Poisoned(format!("Failed to lock connection: {}", e)))
    }
}

impl ProgressSink for SqliteSink {
    fn persist(&self, records: &[Record]) -> SinkResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM dataset_resources", [])?;
        tx.execute("DELETE FROM datasets", [])?;

        {
            let mut insert_dataset = tx.prepare(
                "INSERT INTO datasets (position, title, organization, description)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut insert_resource = tx.prepare(
                "INSERT INTO dataset_resources (dataset_id, position, url) VALUES (?1, ?2, ?3)",
            )?;

            for (position, record) in records.iter().enumerate() {
                let dataset_id = insert_dataset.insert(params![
                    position as i64,
                    record.title,
                    record.organization,
                    record.description
                ])?;
                for (index, url) in record.resources.iter().enumerate() {
                    insert_resource.execute(params![dataset_id, index as i64, url])?;
                }
            }
        }

        tx.execute(
            "INSERT INTO snapshots (saved_at, record_count) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), records.len() as i64],
        )?;
        tx.commit()?;

        tracing::debug!("Stored snapshot of {} records", records.len());
        Ok(())
    }
}
