//! CSV publication for summary and audit tables.
//!
//! Summary tables are small and fully rebuilt on every run, so each write
//! replaces the whole file. Writes go to a temp path in the same directory
//! and are renamed into place, so a crashed run never leaves a truncated
//! table behind.

use crate::error::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

fn tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    std::path::PathBuf::from(name)
}

/// Writes serializable rows as a headed CSV table, atomically.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Publishing CSV table");

    let tmp = tmp_path(path);
    {
        let file = std::fs::File::create(&tmp)?;
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes a raw string matrix (header + rows) as CSV, atomically. Used for
/// the pivoted velocity heatmaps, which are matrices rather than record
/// tables.
pub fn write_matrix(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Publishing CSV matrix");

    let tmp = tmp_path(path);
    {
        let file = std::fs::File::create(&tmp)?;
        let mut writer = WriterBuilder::new().from_writer(file);
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
