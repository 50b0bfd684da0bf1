//! Synchronizer end-to-end tests

mod helper;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use helper::fixtures::{ARTIFACT_URL, ONLINE_URL};
use helper::{StaticFetcher, TestLayout, descriptor, zip_bytes};
use lib_updater::archive::{FsDirectoryLister, ZipExtractor};
use lib_updater::updater::{Synchronizer, UpdateError, UpdateStage};
use lib_updater::version::record::{NONE_VERSION, VersionRecord};
use lib_updater::version::store::{load_record, save_record};

fn synchronizer(layout: &TestLayout, fetcher: Arc<StaticFetcher>) -> Synchronizer {
    Synchronizer::new(
        &layout.config(ONLINE_URL),
        fetcher,
        Arc::new(ZipExtractor),
        Arc::new(FsDirectoryLister),
    )
}

#[tokio::test]
async fn fresh_install_from_empty_record() {
    let layout = TestLayout::new();
    save_record(&layout.record_path(), &VersionRecord::none()).unwrap();
    let fetcher = Arc::new(StaticFetcher::new(
        descriptor("9.9.9", &["l1"]),
        zip_bytes(&[("l1/", ""), ("l1/l1.h", "#pragma once")]),
    ));
    let mut updater = synchronizer(&layout, fetcher.clone());

    assert!(updater.is_necessary_to_update(true).await.unwrap());
    layout.create_library("unrelated");

    let installed = updater.update(false).await.unwrap().clone();

    assert_eq!(installed.version(), "9.9.9");
    assert!(layout.destination().join("l1/l1.h").is_file());
    assert!(layout.destination().join("unrelated").is_dir());
    assert_eq!(fetcher.requested(), vec![ONLINE_URL, ARTIFACT_URL]);

    let persisted = load_record(&layout.record_path()).unwrap();
    assert_eq!(persisted, installed);
    assert_eq!(
        persisted.library_names().iter().collect::<Vec<_>>(),
        vec!["l1", "unrelated"]
    );

    assert!(!updater.is_necessary_to_update(true).await.unwrap());
}

#[tokio::test]
async fn update_replaces_outdated_library_and_keeps_others() {
    let layout = TestLayout::new();
    layout.write_current("1.0.0", &["l1", "userLib"]);
    layout.create_library("userLib");
    layout.create_library("l1");
    fs::write(layout.destination().join("l1/removed.h"), "old").unwrap();
    let fetcher = Arc::new(StaticFetcher::new(
        descriptor("2.0.0", &["l1"]),
        zip_bytes(&[("l1/l1.h", "new")]),
    ));
    let mut updater = synchronizer(&layout, fetcher);

    let updated = updater.update_if_necessary(true).await.unwrap();

    assert!(updated);
    assert!(!layout.destination().join("l1/removed.h").exists());
    assert_eq!(
        fs::read_to_string(layout.destination().join("l1/l1.h")).unwrap(),
        "new"
    );
    assert!(layout.destination().join("userLib").is_dir());
    assert_eq!(load_record(&layout.record_path()).unwrap().version(), "2.0.0");
}

#[tokio::test]
async fn failed_download_leaves_installation_untouched() {
    let layout = TestLayout::new();
    layout.write_current("1.0.0", &["l1"]);
    layout.create_library("l1");
    let fetcher = Arc::new(StaticFetcher::without_artifact(descriptor("2.0.0", &["l1"])));
    let mut updater = synchronizer(&layout, fetcher);

    let result = updater.update_if_necessary(true).await;

    assert!(matches!(result, Err(UpdateError::Network(_))));
    assert_eq!(
        updater.stage(),
        &UpdateStage::Failed(Box::new(UpdateStage::Downloading))
    );
    assert!(layout.destination().join("l1").is_dir());
    assert_eq!(load_record(&layout.record_path()).unwrap().version(), "1.0.0");
    assert_eq!(updater.current_version().unwrap().version(), "1.0.0");
}

#[tokio::test]
async fn update_without_loaded_online_version_fails() {
    let layout = TestLayout::new();
    let fetcher = Arc::new(StaticFetcher::new(descriptor("9.9.9", &[]), Vec::new()));
    let mut updater = synchronizer(&layout, fetcher.clone());

    let result = updater.update(false).await;

    assert!(matches!(result, Err(UpdateError::Precondition(_))));
    assert!(fetcher.requested().is_empty());
}

#[tokio::test]
async fn reading_missing_record_fails_with_not_found() {
    let layout = TestLayout::new();
    let fetcher = Arc::new(StaticFetcher::new(descriptor("9.9.9", &[]), Vec::new()));
    let mut updater = synchronizer(&layout, fetcher);

    let result = updater.read_current_version_info();

    assert!(matches!(result, Err(UpdateError::NotFound(path)) if path == layout.record_path()));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_updates_of_same_destination_run_one_at_a_time() {
    let layout = TestLayout::new();
    layout.write_current(NONE_VERSION, &[]);
    let fetcher = Arc::new(
        StaticFetcher::new(
            descriptor("9.9.9", &["l1", "l2"]),
            zip_bytes(&[("l1/l1.h", ""), ("l2/l2.h", "")]),
        )
        .with_download_delay(Duration::from_millis(100)),
    );
    let mut first = synchronizer(&layout, fetcher.clone()).with_name("first");
    let mut second = synchronizer(&layout, fetcher.clone()).with_name("second");

    let (a, b) = tokio::join!(first.update(true), second.update(true));

    assert_eq!(a.unwrap().version(), "9.9.9");
    assert_eq!(b.unwrap().version(), "9.9.9");
    assert_eq!(fetcher.max_in_flight(), 1);
    assert!(layout.destination().join("l1/l1.h").is_file());
    assert!(layout.destination().join("l2/l2.h").is_file());

    let leftovers: Vec<_> = fs::read_dir(layout.temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.starts_with(".lib-updater-staging-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn from_config_installs_over_http() {
    let mut server = mockito::Server::new_async().await;
    let artifact_url = format!("{}/downloads/libraries.zip", server.url());
    let descriptor_body = serde_json::json!({
        "version": "3.1.4",
        "file2DownloadUrl": { "Linux": artifact_url, "Windows": "unused" },
        "librariesNames": ["Servo"]
    })
    .to_string();
    let descriptor_mock = server
        .mock("GET", "/version.json")
        .with_status(200)
        .with_body(descriptor_body)
        .expect(1)
        .create_async()
        .await;
    let artifact_mock = server
        .mock("GET", "/downloads/libraries.zip")
        .with_status(200)
        .with_body(zip_bytes(&[("Servo/Servo.h", "// servo")]))
        .expect(1)
        .create_async()
        .await;

    let layout = TestLayout::new();
    layout.write_current("3.0.0", &["Servo"]);
    let config = layout.config(&format!("{}/version.json", server.url()));
    let mut updater = Synchronizer::from_config(&config).unwrap();

    let updated = updater.update_if_necessary(true).await.unwrap();

    assert!(updated);
    descriptor_mock.assert_async().await;
    artifact_mock.assert_async().await;
    assert!(layout.destination().join("Servo/Servo.h").is_file());
    let persisted = load_record(&layout.record_path()).unwrap();
    assert_eq!(persisted.version(), "3.1.4");
    assert_eq!(
        persisted.download_reference().resolve("linux"),
        Some(artifact_url.as_str())
    );
}

/// Destination is a symlink into a directory on another filesystem, so the
/// staged libraries cannot be renamed into place
#[cfg(unix)]
#[tokio::test]
async fn update_succeeds_when_destination_links_to_another_filesystem() {
    let shm = std::path::Path::new("/dev/shm");
    if !shm.is_dir() {
        return;
    }
    let elsewhere = tempfile::TempDir::new_in(shm).unwrap();
    let layout = TestLayout::new();
    layout.write_current("1.0.0", &["l1", "userLib"]);
    std::os::unix::fs::symlink(elsewhere.path(), layout.destination()).unwrap();
    layout.create_library("l1");
    layout.create_library("userLib");
    fs::write(layout.destination().join("l1/l1.h"), "old").unwrap();
    let fetcher = Arc::new(StaticFetcher::new(
        descriptor("2.0.0", &["l1"]),
        zip_bytes(&[("l1/l1.h", "new")]),
    ));
    let mut updater = synchronizer(&layout, fetcher);

    let installed = updater.update(true).await.unwrap().clone();

    assert_eq!(installed.version(), "2.0.0");
    assert_eq!(
        fs::read_to_string(elsewhere.path().join("l1/l1.h")).unwrap(),
        "new"
    );
    assert!(elsewhere.path().join("userLib").is_dir());
    assert_eq!(
        installed.library_names().iter().collect::<Vec<_>>(),
        vec!["l1", "userLib"]
    );
}
