//! Filesystem collaborators: archive extraction and directory listing

pub mod zip_extractor;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

pub use zip_extractor::ZipExtractor;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to open archive {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt archive {}: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Extraction aborted: {0}")]
    Aborted(String),
}

/// Trait for unpacking a downloaded artifact
pub trait Archive: Send + Sync {
    /// Extracts every entry of `archive_path` below `destination`, overwriting
    /// files that already exist
    fn extract(&self, archive_path: &Path, destination: &Path) -> Result<(), ExtractError>;
}

/// Trait for enumerating installed libraries
pub trait DirectoryLister: Send + Sync {
    /// Names of the immediate subdirectories of `path`, sorted
    ///
    /// Fails with `io::ErrorKind::NotFound` if `path` does not exist.
    fn list_subdirectories(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// Lists subdirectories straight from the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsDirectoryLister;

impl DirectoryLister for FsDirectoryLister {
    fn list_subdirectories(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            // Follows symlinks so linked libraries count as installed
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("Skipping directory with non UTF-8 name: {:?}", name),
            }
        }
        names.sort();
        Ok(names)
    }
}
