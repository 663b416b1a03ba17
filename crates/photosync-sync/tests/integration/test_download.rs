//! Camera roll download into the dated folder layout

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use photosync_core::config::DownloadProfile;
use photosync_sync::sync_camera_roll;

use crate::common::*;

fn taken() -> Option<DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2024, 7, 3, 8, 15, 0).unwrap())
}

fn download_profile(dest: &std::path::Path, remove_downloaded: bool) -> DownloadProfile {
    DownloadProfile {
        name: "phone".to_string(),
        destination_folder: dest.to_path_buf(),
        remove_downloaded,
    }
}

#[tokio::test]
async fn test_downloads_into_dated_layout() {
    let dest = tempfile::tempdir().unwrap();
    let drive = MockDrive::new();
    let id = drive.add_camera_roll_item("IMG_0001.JPG", b"jpeg bytes", taken());

    let result = sync_camera_roll(
        drive.as_ref(),
        &download_profile(dest.path(), false),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.synced, 1);
    assert_eq!(result.deleted, 0);
    let target = dest.path().join("2024/2024_07_03/IMG_0001.JPG");
    assert_eq!(std::fs::read(&target).unwrap(), b"jpeg bytes");
    assert!(!dest.path().join("2024/2024_07_03/.IMG_0001.JPG.partial").exists());
    assert!(drive.item_exists(&id));
}

#[tokio::test]
async fn test_existing_copy_is_skipped_and_removed_remotely() {
    let dest = tempfile::tempdir().unwrap();
    write_file(dest.path(), "2024/2024_07_03/IMG_0001.JPG", b"jpeg bytes");
    let drive = MockDrive::new();
    let id = drive.add_camera_roll_item("IMG_0001.JPG", b"jpeg bytes", taken());

    let result = sync_camera_roll(
        drive.as_ref(),
        &download_profile(dest.path(), true),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(result.synced, 0);
    assert_eq!(result.deleted, 1);
    assert!(!drive.item_exists(&id));
    assert!(!drive.calls().iter().any(|c| matches!(c, Call::Download(_))));
}

#[tokio::test]
async fn test_truncated_local_copy_is_replaced() {
    let dest = tempfile::tempdir().unwrap();
    write_file(dest.path(), "2024/2024_07_03/IMG_0001.JPG", b"jpeg");
    let drive = MockDrive::new();
    drive.add_camera_roll_item("IMG_0001.JPG", b"jpeg bytes", taken());

    let result = sync_camera_roll(
        drive.as_ref(),
        &download_profile(dest.path(), false),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.synced, 1);
    let target = dest.path().join("2024/2024_07_03/IMG_0001.JPG");
    assert_eq!(std::fs::read(target).unwrap(), b"jpeg bytes");
}

#[tokio::test]
async fn test_size_mismatch_leaves_no_file_and_keeps_remote() {
    let dest = tempfile::tempdir().unwrap();
    let drive = MockDrive::new();
    let id = drive.add_camera_roll_item("IMG_0002.JPG", b"jpeg bytes", taken());
    drive.override_size("IMG_0002.JPG", 4096);

    let result = sync_camera_roll(
        drive.as_ref(),
        &download_profile(dest.path(), true),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.errors, 1);
    assert_eq!(result.deleted, 0);
    let day = dest.path().join("2024/2024_07_03");
    assert!(!day.join("IMG_0002.JPG").exists());
    assert!(!day.join(".IMG_0002.JPG.partial").exists());
    assert!(drive.item_exists(&id));
}

#[tokio::test]
async fn test_undated_item_is_skipped() {
    let dest = tempfile::tempdir().unwrap();
    let drive = MockDrive::new();
    drive.add_camera_roll_item("mystery.jpg", b"bytes", None);

    let result = sync_camera_roll(
        drive.as_ref(),
        &download_profile(dest.path(), false),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.skipped, 1);
    assert_eq!(result.synced, 0);
    assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancelled_before_first_item() {
    let dest = tempfile::tempdir().unwrap();
    let drive = MockDrive::new();
    drive.add_camera_roll_item("IMG_0001.JPG", b"jpeg bytes", taken());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = sync_camera_roll(drive.as_ref(), &download_profile(dest.path(), false), &cancel)
        .await
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(result.synced, 0);
}
