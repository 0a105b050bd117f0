//! Writing a RecordSet back to disk
//!
//! Rows go to a temporary file next to the destination, which is renamed over
//! the destination only once everything has been flushed. A failed save leaves
//! whatever was at `path` untouched.

use std::fs;
use std::io::{self, BufWriter};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::parser::write_records;
use crate::record::RecordSet;

/// Atomically replace `path` with the serialized records
pub fn write_atomic(path: &Path, records: &RecordSet) -> io::Result<()> {
    debug!(path = %path.display(), rows = records.len(), "write_atomic: called");

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;

    // Keep the mode of the file being replaced instead of the temp file's 0600
    if let Ok(existing) = fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }

    write_records(records, BufWriter::new(tmp.as_file()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), "write_atomic: persisted");
    Ok(())
}
