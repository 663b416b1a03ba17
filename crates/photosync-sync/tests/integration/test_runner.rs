//! Multi-profile runs: failure isolation and cache maintenance

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use photosync_core::config::{Config, DownloadProfile, UploadProfile};
use photosync_sync::{ProfileRunner, ProfileStatus};

use crate::common::*;

fn config(data_dir: &Path, uploads: Vec<UploadProfile>) -> Config {
    let mut config = Config {
        data_dir: data_dir.to_path_buf(),
        upload_profiles: uploads,
        ..Config::default()
    };
    config.network.max_retries = 3;
    config.network.retry_base_delay_ms = 1;
    config.auth.timeout_secs = 1;
    config
}

fn named(source: &Path, name: &str) -> UploadProfile {
    UploadProfile {
        name: name.to_string(),
        ..profile(source, &[])
    }
}

fn runner(drive: &Arc<MockDrive>, auth: StubAuth, config: &Config) -> ProfileRunner {
    ProfileRunner::new(Arc::new(auth), Arc::new(MockFactory(drive.clone())), config)
}

#[tokio::test]
async fn test_auth_failure_does_not_stop_other_profiles() {
    let data = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    write_file_at(src.path(), "a.pdf", b"alpha", 1_000);
    let config = config(
        data.path(),
        vec![named(src.path(), "denied"), named(src.path(), "granted")],
    );
    let drive = MockDrive::new();
    let auth = StubAuth {
        denied: vec!["denied".to_string()],
        ..StubAuth::default()
    };

    let reports = runner(&drive, auth, &config)
        .run_uploads(&config.upload_profiles, &CancellationToken::new())
        .await;

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].status, ProfileStatus::Failed);
    assert!(reports[0].error.as_deref().unwrap().contains("declined"));
    assert!(reports[0].result.is_none());
    assert_eq!(reports[1].status, ProfileStatus::Succeeded);
    assert_eq!(reports[1].result.as_ref().unwrap().uploaded, 1);
    assert!(data.path().join("state/granted.db").exists());
    assert!(!data.path().join("state/denied.db").exists());
}

#[tokio::test]
async fn test_hanging_login_times_out() {
    let data = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    write_file_at(src.path(), "a.pdf", b"alpha", 1_000);
    let config = config(
        data.path(),
        vec![named(src.path(), "stuck"), named(src.path(), "granted")],
    );
    let drive = MockDrive::new();
    let auth = StubAuth {
        hanging: vec!["stuck".to_string()],
        ..StubAuth::default()
    };

    let reports = runner(&drive, auth, &config)
        .run_uploads(&config.upload_profiles, &CancellationToken::new())
        .await;

    assert_eq!(reports[0].status, ProfileStatus::Failed);
    assert!(reports[0].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(reports[1].status, ProfileStatus::Succeeded);
}

#[tokio::test]
async fn test_high_failure_ratio_fails_profile() {
    let data = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    write_file_at(src.path(), "a.pdf", b"alpha", 1_000);
    write_file_at(src.path(), "b.pdf", b"bravo", 2_000);
    let config = config(data.path(), vec![named(src.path(), "scans")]);
    let drive = MockDrive::new();
    drive.fail_uploads_named(
        "a.pdf",
        photosync_core::domain::DriveError::QuotaOrPermission("full".into()),
    );
    drive.fail_uploads_named(
        "b.pdf",
        photosync_core::domain::DriveError::QuotaOrPermission("full".into()),
    );

    let reports = runner(&drive, StubAuth::default(), &config)
        .run_uploads(&config.upload_profiles, &CancellationToken::new())
        .await;

    assert!(reports[0].is_failure());
    assert_eq!(reports[0].result.as_ref().unwrap().failed, 2);
}

#[tokio::test]
async fn test_cancelled_run_skips_remaining_profiles() {
    let data = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    write_file_at(src.path(), "a.pdf", b"alpha", 1_000);
    let config = config(
        data.path(),
        vec![named(src.path(), "first"), named(src.path(), "second")],
    );
    let drive = MockDrive::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let reports = runner(&drive, StubAuth::default(), &config)
        .run_uploads(&config.upload_profiles, &cancel)
        .await;

    assert!(reports.iter().all(|r| r.status == ProfileStatus::Cancelled));
    assert!(drive.calls().is_empty());
}

#[tokio::test]
async fn test_cache_status_and_clear() {
    let data = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    write_file_at(src.path(), "a.pdf", b"alpha", 1_000);
    write_file_at(src.path(), "b.pdf", b"bravo", 2_000);
    let config = config(data.path(), vec![named(src.path(), "scans")]);
    let drive = MockDrive::new();
    drive.fail_uploads_named(
        "b.pdf",
        photosync_core::domain::DriveError::Conflict("locked".into()),
    );
    let runner = runner(&drive, StubAuth::default(), &config);
    let profile = &config.upload_profiles[0];

    runner
        .run_upload(profile, &CancellationToken::new())
        .await
        .unwrap();

    let status = runner.cache_status(profile).await.unwrap();
    assert_eq!(status.entries, 2);
    assert_eq!(status.uploaded, 1);
    assert_eq!(status.failed, 1);
    assert!(!status.recovered_from_corruption);
    assert!(status.db_path.is_some());
    assert_eq!(status.watermark.unwrap().high_water_mtime.timestamp(), 1_000);

    runner.clear_cache(profile).await.unwrap();
    let status = runner.cache_status(profile).await.unwrap();
    assert_eq!(status.entries, 0);
    assert!(status.watermark.is_none());
}

#[tokio::test]
async fn test_build_cache_through_runner() {
    let data = tempfile::tempdir().unwrap();
    let src = tempfile::tempdir().unwrap();
    write_file_at(src.path(), "a.pdf", b"alpha", 1_000);
    let config = config(data.path(), vec![named(src.path(), "scans")]);
    let drive = MockDrive::new();
    drive.add_file("/Backup/a.pdf", b"alpha");
    let runner = runner(&drive, StubAuth::default(), &config);
    let profile = &config.upload_profiles[0];

    let stats = runner.build_cache(profile).await.unwrap();
    assert_eq!(stats.matched, 1);

    drive.clear_calls();
    let result = runner
        .run_upload(profile, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.skipped, 1);
    assert_eq!(drive.transfer_calls(), 0);
}

#[tokio::test]
async fn test_download_profiles_are_isolated() {
    let data = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let config = config(data.path(), Vec::new());
    let drive = MockDrive::new();
    drive.add_camera_roll_item(
        "IMG_0001.JPG",
        b"jpeg",
        chrono::DateTime::from_timestamp(1_720_000_000, 0),
    );
    let auth = StubAuth {
        denied: vec!["locked".to_string()],
        ..StubAuth::default()
    };
    let profiles = vec![
        DownloadProfile {
            name: "locked".to_string(),
            destination_folder: dest.path().join("locked"),
            remove_downloaded: false,
        },
        DownloadProfile {
            name: "phone".to_string(),
            destination_folder: dest.path().join("phone"),
            remove_downloaded: false,
        },
    ];

    let reports = runner(&drive, auth, &config)
        .run_downloads(&profiles, &CancellationToken::new())
        .await;

    assert_eq!(reports[0].status, ProfileStatus::Failed);
    assert_eq!(reports[1].status, ProfileStatus::Succeeded);
    assert_eq!(reports[1].result.unwrap().synced, 1);
}
