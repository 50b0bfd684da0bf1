//! HTTP implementation of [`Fetcher`] backed by reqwest

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{RETRY_BASE_DELAY_MS, UpdaterConfig};
use crate::fetch::{FetchError, Fetcher, artifact_file_name};

/// Fetcher that talks HTTP(S), with timeouts and bounded retries
///
/// `timeout` bounds connecting and each read of the response body. Descriptor
/// requests are also bounded by it as a whole; artifact downloads are not, so
/// a large artifact on a slow link still completes as long as data keeps arriving.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    retry_attempts: u32,
    retry_base_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher with the given timeout and optional proxy URL
    pub fn new(timeout: Duration, proxy: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("lib-updater/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .read_timeout(timeout);
        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            timeout,
            retry_attempts: 1,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        })
    }

    pub fn from_config(config: &UpdaterConfig) -> Result<Self, FetchError> {
        let fetcher = Self::new(
            Duration::from_millis(config.fetch_timeout_ms),
            config.proxy.as_deref(),
        )?;
        Ok(fetcher.with_retry(
            config.retry_attempts,
            Duration::from_millis(RETRY_BASE_DELAY_MS),
        ))
    }

    /// Retry failed requests up to `attempts` times in total, doubling `base_delay`
    /// after each failure
    pub fn with_retry(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// runs out of attempts
    async fn with_retries<T, F, Fut>(&self, url: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= self.retry_attempts || !error.is_retryable() {
                return Err(error);
            }

            let delay = self.retry_base_delay * 2u32.saturating_pow(attempt - 1);
            warn!(
                "Fetch attempt {}/{} for {} failed: {}. Retrying in {:?}",
                attempt, self.retry_attempts, url, error, delay
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// Send a GET request and reject unsuccessful statuses
    async fn get(
        &self,
        url: &str,
        total_timeout: Option<Duration>,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = total_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// One download attempt; the file is recreated so a retry never appends to
    /// a partial body
    async fn download(&self, url: &str, path: &Path) -> Result<u64, FetchError> {
        let mut response = self.get(url, None).await?;
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|source| write_error(path, source))?;

        let mut downloaded: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|source| write_error(path, source))?;
            downloaded += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|source| write_error(path, source))?;
        Ok(downloaded)
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching {}", url);
        self.with_retries(url, || async move {
            let response = self.get(url, Some(self.timeout)).await?;
            Ok::<_, FetchError>(response.text().await?)
        })
        .await
    }

    async fn fetch_to_file(&self, url: &str, dir: &Path) -> Result<PathBuf, FetchError> {
        let path = dir.join(artifact_file_name(url));
        let target = path.as_path();

        let result = self.with_retries(url, move || self.download(url, target)).await;
        match result {
            Ok(downloaded) => {
                info!("Downloaded {} bytes from {} to {:?}", downloaded, url, path);
                Ok(path)
            }
            Err(e) => {
                match tokio::fs::remove_file(&path).await {
                    Err(remove) if remove.kind() != std::io::ErrorKind::NotFound => {
                        warn!("Failed to remove partial download {:?}: {}", path, remove);
                    }
                    _ => {}
                }
                Err(e)
            }
        }
    }
}

fn write_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.to_path_buf(),
        source,
    }
}
