use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::models::WeatherTable;
use crate::utils::constants::{
    DEFAULT_PROCESSED_DIR, DEFAULT_RAW_DIR, PROCESSED_SNAPSHOT_FILE, RAW_SNAPSHOT_FILE,
};

/// Writes a table as CSV with a header of its present columns.
pub struct CsvTableWriter {
    delimiter: u8,
}

impl CsvTableWriter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn write(&self, table: &WeatherTable, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.write_to(table, File::create(path)?)
    }

    pub fn write_to<W: Write>(&self, table: &WeatherTable, output: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(output);

        writer.write_record(table.column_names())?;
        for record in table {
            writer.write_record(table.columns().iter().map(|c| record.cell(*c)))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for CsvTableWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw and cleaned table snapshots on disk.
///
/// Saving is best effort: a failure is logged and reported as `None`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    pub fn raw_path(&self) -> PathBuf {
        self.raw_dir.join(RAW_SNAPSHOT_FILE)
    }

    pub fn processed_path(&self) -> PathBuf {
        self.processed_dir.join(PROCESSED_SNAPSHOT_FILE)
    }

    pub fn save_raw(&self, table: &WeatherTable) -> Option<PathBuf> {
        Self::save(table, self.raw_path(), "raw")
    }

    pub fn save_processed(&self, table: &WeatherTable) -> Option<PathBuf> {
        Self::save(table, self.processed_path(), "processed")
    }

    fn save(table: &WeatherTable, path: PathBuf, kind: &str) -> Option<PathBuf> {
        match CsvTableWriter::new().write(table, &path) {
            Ok(()) => {
                info!(path = %path.display(), rows = table.len(), "saved {} snapshot", kind);
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not save {} snapshot", kind);
                None
            }
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_RAW_DIR, DEFAULT_PROCESSED_DIR)
    }
}
