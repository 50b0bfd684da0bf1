use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ExtractError;
use crate::fetch::FetchError;
use crate::version::error::{FormatError, StoreError};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Network error: {0}")]
    Network(#[from] FetchError),

    #[error("Invalid version descriptor: {0}")]
    Parse(String),

    #[error("Precondition failed: {0}")]
    Precondition(&'static str),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Version {version} has no download for platform {platform}")]
    NoDownloadForPlatform { version: String, platform: String },

    #[error("Background task aborted: {0}")]
    Aborted(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<StoreError> for UpdateError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(path) => UpdateError::NotFound(path),
            StoreError::Parse { path, source } => {
                UpdateError::Parse(format!("{}: {}", path.display(), source))
            }
            StoreError::Serialize(source) => UpdateError::Parse(source.to_string()),
            StoreError::Io { path, source } => UpdateError::Io { path, source },
        }
    }
}
