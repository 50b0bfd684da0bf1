//! Filesystem fixtures

use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use lib_updater::config::UpdaterConfig;
use lib_updater::version::record::{DownloadReference, VersionRecord};
use lib_updater::version::store::save_record;

pub const ONLINE_URL: &str = "https://example.com/version.json";
pub const ARTIFACT_URL: &str = "https://example.com/libraries.zip";

/// Version descriptor as published online
pub fn descriptor(version: &str, libraries: &[&str]) -> String {
    json!({
        "version": version,
        "file2DownloadUrl": ARTIFACT_URL,
        "librariesNames": libraries
    })
    .to_string()
}

/// Build an in-memory zip; names ending in `/` become directories
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Temporary record file and destination directory
pub struct TestLayout {
    pub temp_dir: TempDir,
}

impl TestLayout {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn record_path(&self) -> PathBuf {
        self.temp_dir.path().join("currentVersion.version")
    }

    pub fn destination(&self) -> PathBuf {
        self.temp_dir.path().join("destinationPath")
    }

    pub fn config(&self, online_version_url: &str) -> UpdaterConfig {
        UpdaterConfig {
            online_version_url: online_version_url.to_string(),
            current_version_path: self.record_path(),
            destination_path: self.destination(),
            platform: "linux".to_string(),
            retry_attempts: 1,
            ..UpdaterConfig::default()
        }
    }

    pub fn write_current(&self, version: &str, libraries: &[&str]) {
        let record = VersionRecord::new(
            version,
            DownloadReference::Url(ARTIFACT_URL.to_string()),
            libraries.iter().copied(),
        )
        .unwrap();
        save_record(&self.record_path(), &record).unwrap();
    }

    pub fn create_library(&self, name: &str) {
        fs::create_dir_all(self.destination().join(name)).unwrap();
    }
}
