//! Library synchronizer
//!
//! Decides whether the installed libraries are current relative to the
//! published version descriptor, and installs the published artifact when they
//! are not.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::archive::{Archive, DirectoryLister, FsDirectoryLister, ZipExtractor};
use crate::config::UpdaterConfig;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::updater::error::UpdateError;
use crate::updater::lock::destination_lock;
use crate::updater::stage::UpdateStage;
use crate::updater::staging::StagingArea;
use crate::version::record::VersionRecord;
use crate::version::store::{load_record, save_record};

const DEFAULT_NAME: &str = "Updater";

pub struct Synchronizer {
    name: String,
    online_version_url: String,
    current_version_path: PathBuf,
    destination_path: PathBuf,
    platform: String,
    fetcher: Arc<dyn Fetcher>,
    archive: Arc<dyn Archive>,
    lister: Arc<dyn DirectoryLister>,
    current_version: Option<VersionRecord>,
    online_version: Option<VersionRecord>,
    stage: UpdateStage,
}

impl Synchronizer {
    pub fn new(
        config: &UpdaterConfig,
        fetcher: Arc<dyn Fetcher>,
        archive: Arc<dyn Archive>,
        lister: Arc<dyn DirectoryLister>,
    ) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            online_version_url: config.online_version_url.clone(),
            current_version_path: config.current_version_path.clone(),
            destination_path: config.destination_path.clone(),
            platform: config.platform.clone(),
            fetcher,
            archive,
            lister,
            current_version: None,
            online_version: None,
            stage: UpdateStage::Idle,
        }
    }

    /// Build a Synchronizer with the HTTP fetcher, zip extractor and filesystem lister
    pub fn from_config(config: &UpdaterConfig) -> Result<Self, UpdateError> {
        let fetcher = HttpFetcher::from_config(config)?;
        Ok(Self::new(
            config,
            Arc::new(fetcher),
            Arc::new(ZipExtractor),
            Arc::new(FsDirectoryLister),
        ))
    }

    /// Name used to tell synchronizers apart in logs
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn current_version(&self) -> Option<&VersionRecord> {
        self.current_version.as_ref()
    }

    pub fn online_version(&self) -> Option<&VersionRecord> {
        self.online_version.as_ref()
    }

    /// Stage reached by the last update
    pub fn stage(&self) -> &UpdateStage {
        &self.stage
    }

    /// Load the installed version record from disk
    pub fn read_current_version_info(&mut self) -> Result<&VersionRecord, UpdateError> {
        let record = load_record(&self.current_version_path)?;
        debug!("[{}] Current version: {}", self.name, record);
        Ok(self.current_version.insert(record))
    }

    /// Fetch and parse the published version descriptor
    pub async fn download_online_version_info(&mut self) -> Result<&VersionRecord, UpdateError> {
        if self.online_version_url.is_empty() {
            return Err(UpdateError::Precondition(
                "online version URL is not configured",
            ));
        }

        let payload = self.fetcher.fetch_text(&self.online_version_url).await?;
        let record: VersionRecord = serde_json::from_str(&payload).map_err(|e| {
            warn!(
                "[{}] Invalid descriptor from {}: {}",
                self.name, self.online_version_url, e
            );
            UpdateError::Parse(format!("{}: {}", self.online_version_url, e))
        })?;

        debug!("[{}] Online version: {}", self.name, record);
        Ok(self.online_version.insert(record))
    }

    /// Reload both the installed and the published version records
    pub async fn reload_versions(&mut self) -> Result<(), UpdateError> {
        self.read_current_version_info()?;
        self.download_online_version_info().await?;
        Ok(())
    }

    /// Whether the installed libraries differ from the published version
    ///
    /// True when the installed and published versions differ, or when any
    /// library the installed record expects has no directory in the destination.
    pub async fn is_necessary_to_update(&mut self, reload_versions: bool) -> Result<bool, UpdateError> {
        if reload_versions {
            self.reload_versions().await?;
        }

        let (Some(current), Some(online)) = (&self.current_version, &self.online_version) else {
            return Err(UpdateError::Precondition(
                "current and online versions must be loaded before checking for updates",
            ));
        };

        debug!("[{}] Checking version {} - {}", self.name, current, online);
        if current != online {
            info!(
                "[{}] Version {} differs from published version {}",
                self.name, current, online
            );
            return Ok(true);
        }

        let directories = self.list_installed().await?;
        Ok(self.are_libraries_missing(current, &directories))
    }

    /// Update if [`Self::is_necessary_to_update`] says so
    ///
    /// Returns whether an update was performed.
    pub async fn update_if_necessary(&mut self, reload_versions: bool) -> Result<bool, UpdateError> {
        if !self.is_necessary_to_update(reload_versions).await? {
            info!("[{}] Libraries are up to date", self.name);
            return Ok(false);
        }
        // Versions were just loaded; no need to fetch them a second time
        self.update(false).await?;
        Ok(true)
    }

    /// Download the published artifact, install it and persist the new record
    ///
    /// Only one update per destination runs at a time. The artifact is downloaded
    /// and extracted in a staging directory, so a failure before the merge leaves
    /// the destination unchanged. During the merge, a library that fails to
    /// install is restored to its previous contents; libraries merged before it
    /// keep the new contents.
    pub async fn update(&mut self, reload_versions: bool) -> Result<&VersionRecord, UpdateError> {
        let lock = destination_lock(&self.destination_path);
        let _guard = lock.lock().await;

        self.stage = UpdateStage::Idle;
        match self.run_update(reload_versions).await {
            Ok(record) => {
                info!("[{}] Updated to version {}", self.name, record);
                Ok(self.current_version.insert(record))
            }
            Err(e) => {
                warn!("[{}] Update failed while {}: {}", self.name, self.stage.as_str(), e);
                self.stage = std::mem::take(&mut self.stage).fail();
                Err(e)
            }
        }
    }

    async fn run_update(&mut self, reload_versions: bool) -> Result<VersionRecord, UpdateError> {
        if reload_versions {
            self.reload_versions().await?;
        }

        let online = self
            .online_version
            .clone()
            .ok_or(UpdateError::Precondition(
                "online version must be loaded before updating",
            ))?;
        let url = online
            .download_reference()
            .resolve(&self.platform)
            .ok_or_else(|| UpdateError::NoDownloadForPlatform {
                version: online.version().to_string(),
                platform: self.platform.clone(),
            })?
            .to_string();
        self.advance(UpdateStage::VersionsReady);

        let staging = StagingArea::beside(&self.destination_path)?;

        self.advance(UpdateStage::Downloading);
        info!("[{}] Downloading version {} from {}", self.name, online, url);
        let archive_path = self
            .fetcher
            .fetch_to_file(&url, &staging.download_dir())
            .await?;

        self.advance(UpdateStage::Extracting);
        let staging = staging.extract(self.archive.clone(), archive_path).await?;
        let destination = self.destination_path.clone();
        run_blocking(move || staging.install_into(&destination)).await?;

        self.advance(UpdateStage::Reconciling);
        let lister = self.lister.clone();
        let destination = self.destination_path.clone();
        let record_path = self.current_version_path.clone();
        let record = run_blocking(move || {
            let installed = list_libraries(lister.as_ref(), &destination)?;
            let record = online.with_library_names(installed);
            save_record(&record_path, &record)?;
            Ok(record)
        })
        .await?;

        self.advance(UpdateStage::Persisted);
        Ok(record)
    }

    fn advance(&mut self, stage: UpdateStage) {
        debug!("[{}] Update stage: {} -> {}", self.name, self.stage, stage);
        self.stage = stage;
    }

    fn are_libraries_missing(&self, current: &VersionRecord, directories: &[String]) -> bool {
        debug!("[{}] Checking library names", self.name);
        let installed: HashSet<String> = directories.iter().map(|n| n.to_lowercase()).collect();

        let missing: Vec<&str> = current
            .library_names()
            .iter()
            .filter(|name| !installed.contains(&name.to_lowercase()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            info!("[{}] Missing libraries: {:?}", self.name, missing);
            return true;
        }

        current.library_names().len() > directories.len()
    }

    async fn list_installed(&self) -> Result<Vec<String>, UpdateError> {
        let lister = self.lister.clone();
        let destination = self.destination_path.clone();
        run_blocking(move || list_libraries(lister.as_ref(), &destination)).await
    }
}

/// Run filesystem work on the blocking thread pool
async fn run_blocking<T, F>(task: F) -> Result<T, UpdateError>
where
    F: FnOnce() -> Result<T, UpdateError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| UpdateError::Aborted(e.to_string()))?
}

fn list_libraries(
    lister: &dyn DirectoryLister,
    destination: &Path,
) -> Result<Vec<String>, UpdateError> {
    lister.list_subdirectories(destination).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            UpdateError::NotFound(destination.to_path_buf())
        } else {
            UpdateError::Io {
                path: destination.to_path_buf(),
                source,
            }
        }
    })
}
