//! Staging directory for downloads and extraction
//!
//! The artifact is downloaded and extracted inside a temporary directory next to
//! the destination, so the destination is not touched until the artifact has
//! been fully extracted. Dropping a `StagingArea` removes everything left in it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::archive::{Archive, ExtractError};
use crate::updater::error::UpdateError;

const DOWNLOAD_DIR: &str = "download";
const EXTRACT_DIR: &str = "extract";
const BACKUP_SUFFIX: &str = ".lib-updater-old";

pub struct StagingArea {
    root: TempDir,
}

impl StagingArea {
    /// Create a staging area beside `destination`
    ///
    /// Staging next to the destination usually keeps both on one filesystem, so
    /// extracted entries are moved into place with a rename. When the destination
    /// is a mount point or links elsewhere, entries are copied instead.
    pub fn beside(destination: &Path) -> Result<Self, UpdateError> {
        let parent = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;

        let root = tempfile::Builder::new()
            .prefix(".lib-updater-staging-")
            .tempdir_in(parent)
            .map_err(|source| io_error(parent, source))?;
        for dir in [DOWNLOAD_DIR, EXTRACT_DIR] {
            let path = root.path().join(dir);
            fs::create_dir(&path).map_err(|source| io_error(&path, source))?;
        }

        debug!("Created staging area at {:?}", root.path());
        Ok(Self { root })
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.path().join(DOWNLOAD_DIR)
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.root.path().join(EXTRACT_DIR)
    }

    /// Extract `archive_path` into the staging area on the blocking thread pool
    ///
    /// The staging area moves into the blocking task and is handed back once
    /// extraction is done. If the caller stops waiting, the task still owns it
    /// and cleans it up when it finishes.
    pub async fn extract(
        self,
        archive: Arc<dyn Archive>,
        archive_path: PathBuf,
    ) -> Result<Self, UpdateError> {
        let staging = tokio::task::spawn_blocking(move || -> Result<Self, ExtractError> {
            archive.extract(&archive_path, &self.extract_dir())?;
            Ok(self)
        })
        .await
        .map_err(|e| ExtractError::Aborted(e.to_string()))??;
        Ok(staging)
    }

    /// Move every extracted top-level entry into `destination`
    ///
    /// An entry that already exists in `destination` under the same name is
    /// replaced. Entries of `destination` that are not part of the artifact are
    /// left alone. Returns the names of the moved entries.
    pub fn install_into(self, destination: &Path) -> Result<Vec<String>, UpdateError> {
        self.install_with(destination, |from, to| fs::rename(from, to))
    }

    fn install_with<R>(self, destination: &Path, rename: R) -> Result<Vec<String>, UpdateError>
    where
        R: Fn(&Path, &Path) -> io::Result<()>,
    {
        fs::create_dir_all(destination).map_err(|source| write_error(destination, source))?;

        let extract_dir = self.extract_dir();
        let entries = fs::read_dir(&extract_dir).map_err(|source| io_error(&extract_dir, source))?;

        let mut installed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&extract_dir, source))?;
            let name = entry.file_name();
            let target = destination.join(&name);

            replace_entry(&entry.path(), &target, &rename)
                .map_err(|source| write_error(&target, source))?;

            debug!("Installed {:?}", target);
            installed.push(name.to_string_lossy().into_owned());
        }

        installed.sort();
        info!("Installed {:?} into {:?}", installed, destination);
        Ok(installed)
    }
}

/// Put `staged` in place of `target`
///
/// The previous `target` is moved aside inside its own directory first and is
/// moved back if `staged` cannot be installed.
fn replace_entry<R>(staged: &Path, target: &Path, rename: &R) -> io::Result<()>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    let backup = match fs::symlink_metadata(target) {
        Ok(_) => {
            let backup = backup_path(target);
            // Left behind by an interrupted run
            remove_entry_if_exists(&backup)?;
            rename(target, &backup)?;
            Some(backup)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    let result = move_entry(staged, target, rename);
    let Some(backup) = backup else {
        return result;
    };

    match result {
        Ok(()) => {
            if let Err(e) = remove_entry_if_exists(&backup) {
                warn!("Failed to remove previous version at {:?}: {}", backup, e);
            }
            Ok(())
        }
        Err(e) => {
            if let Err(restore) =
                remove_entry_if_exists(target).and_then(|()| rename(&backup, target))
            {
                warn!(
                    "Failed to restore {:?} from {:?}: {}",
                    target, backup, restore
                );
            }
            Err(e)
        }
    }
}

/// Rename `from` to `to`, copying instead when they are on different filesystems
fn move_entry<R>(from: &Path, to: &Path, rename: &R) -> io::Result<()>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    match rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("{:?} is on another filesystem, copying", to);
            copy_recursive(from, to).inspect_err(|_| {
                remove_entry_if_exists(to).ok();
            })
        }
        result => result,
    }
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_dir() {
        return fs::copy(from, to).map(|_| ());
    }
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

fn backup_path(target: &Path) -> PathBuf {
    let name = target.file_name().unwrap_or_default().to_string_lossy();
    target.with_file_name(format!(".{name}{BACKUP_SUFFIX}"))
}

fn remove_entry_if_exists(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn io_error(path: &Path, source: io::Error) -> UpdateError {
    UpdateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_error(path: &Path, source: io::Error) -> UpdateError {
    UpdateError::Extraction(ExtractError::Write {
        path: path.to_path_buf(),
        source,
    })
}
