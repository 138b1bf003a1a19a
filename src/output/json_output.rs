//! JSON file sink
//!
//! Writes the collection as a pretty-printed JSON array. The file is written
//! to a sibling temporary path and renamed into place, so readers never see
//! a half-written snapshot.

use crate::crawler::Record;
use crate::output::traits::{ProgressSink, SinkResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink writing the collection to a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ProgressSink for JsonFileSink {
    fn persist(&self, records: &[Record]) -> SinkResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            serde_json::to_writer_pretty(&mut writer, records)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        fs::rename(&temp, &self.path)?;

        tracing::debug!("Wrote {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Reads back a collection written by [`JsonFileSink`]
pub fn load_records(path: &Path) -> SinkResult<Vec<Record>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
