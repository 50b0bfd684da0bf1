//! Fetcher test utilities

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use lib_updater::fetch::{FetchError, Fetcher, artifact_file_name};

/// Fetcher serving a fixed descriptor and artifact
///
/// Records the URLs it was asked for and the highest number of downloads that
/// were in flight at the same time.
pub struct StaticFetcher {
    descriptor: String,
    artifact: Option<Vec<u8>>,
    download_delay: Duration,
    requested: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(descriptor: impl Into<String>, artifact: Vec<u8>) -> Self {
        Self {
            descriptor: descriptor.into(),
            artifact: Some(artifact),
            download_delay: Duration::ZERO,
            requested: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Downloads fail with a 404 status
    pub fn without_artifact(descriptor: impl Into<String>) -> Self {
        Self {
            artifact: None,
            ..Self::new(descriptor, Vec::new())
        }
    }

    pub fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = delay;
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        Ok(self.descriptor.clone())
    }

    async fn fetch_to_file(&self, url: &str, dir: &Path) -> Result<PathBuf, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.download_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let Some(artifact) = &self.artifact else {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        };
        let path = dir.join(artifact_file_name(url));
        std::fs::write(&path, artifact).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
