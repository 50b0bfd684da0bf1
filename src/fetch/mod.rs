//! Fetching version descriptors and artifacts from remote sources

pub mod http;

use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;
use thiserror::Error;

pub use http::HttpFetcher;

/// File name used for downloads whose URL has no usable last path segment
const FALLBACK_ARTIFACT_NAME: &str = "artifact";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Io { .. } => false,
        }
    }
}

/// Trait for fetching remote content
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches the body at `url` as text
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Downloads the body at `url` into `dir`
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path of the downloaded file inside `dir`
    /// * `Err(FetchError)` - If the request or the write fails
    async fn fetch_to_file(&self, url: &str, dir: &Path) -> Result<PathBuf, FetchError>;
}

/// Name of the file a download from `url` is stored under
pub fn artifact_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path.split_once("://").map_or(path, |(_, rest)| {
        rest.split_once('/').map_or("", |(_, path)| path)
    });

    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name.to_string(),
        _ => FALLBACK_ARTIFACT_NAME.to_string(),
    }
}
