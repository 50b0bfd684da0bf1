use std::path::PathBuf;

use thiserror::Error;

/// Version string that is not a dotted sequence of non-negative integers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Bad version format: {version:?}")]
pub struct FormatError {
    pub version: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Version file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid version file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize version record: {0}")]
    Serialize(serde_json::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
