//! Persistence of the installed version record
//!
//! The record is stored as a pretty-printed JSON descriptor. Writes go to a
//! temporary file in the same directory which is synced and then renamed over
//! the target, so readers never observe a half-written record.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::debug;

use crate::version::error::StoreError;
use crate::version::record::VersionRecord;

/// Read the version record stored at `path`
pub fn load_record(path: &Path) -> Result<VersionRecord, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let record = serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded version record from {:?}", path);
    Ok(record)
}

/// Atomically replace the version record stored at `path`
pub fn save_record(path: &Path, record: &VersionRecord) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let io_error = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(parent).map_err(io_error)?;

    let serialized = serde_json::to_string_pretty(record).map_err(StoreError::Serialize)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(io_error)?;
    temp_file
        .write_all(serialized.as_bytes())
        .map_err(io_error)?;
    temp_file.as_file().sync_all().map_err(io_error)?;
    temp_file.persist(path).map_err(|e| io_error(e.error))?;

    debug!("Saved version {} to {:?}", record.version(), path);
    Ok(())
}
