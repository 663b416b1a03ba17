//! Integration tests for renewing an expired access token mid-run

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use photosync_core::domain::{DriveError, RemotePath};

use crate::common::{self, FixedAuth};

fn expired() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(serde_json::json!({
        "error": { "code": "InvalidAuthenticationToken", "message": "Access token has expired." }
    }))
}

#[tokio::test]
async fn test_expired_token_is_renewed_and_request_repeated() {
    let auth = FixedAuth::new("fresh-token");
    let (server, drive) = common::setup_drive_mock_with_auth("stale-token", auth.clone()).await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Backup"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Backup"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::folder_json("BACKUP", "Backup")))
        .expect(2)
        .mount(&server)
        .await;

    let backup = RemotePath::new("/Backup").unwrap();
    let item = drive.get_item_by_path(&backup).await.unwrap().unwrap();
    assert_eq!(item.id, "BACKUP");

    // Later requests go out with the renewed token directly
    drive.get_item_by_path(&backup).await.unwrap();
    assert_eq!(auth.calls(), 1);
}

#[tokio::test]
async fn test_rejected_token_without_replacement_is_unauthorized() {
    let auth = FixedAuth::new("same-token");
    let (server, drive) = common::setup_drive_mock_with_auth("same-token", auth.clone()).await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root:/Backup"))
        .respond_with(expired())
        .expect(1)
        .mount(&server)
        .await;

    let err = drive
        .get_item_by_path(&RemotePath::new("/Backup").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Unauthorized(_)));
    assert_eq!(auth.calls(), 1);
}

#[tokio::test]
async fn test_simple_upload_survives_token_expiry() {
    let auth = FixedAuth::new("fresh-token");
    let (server, drive) = common::setup_drive_mock_with_auth("stale-token", auth.clone()).await;

    Mock::given(method("PUT"))
        .and(path("/me/drive/items/FOLDER:/a.pdf:/content"))
        .and(header("authorization", "Bearer stale-token"))
        .respond_with(expired())
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/me/drive/items/FOLDER:/a.pdf:/content"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_json("F1", "a.pdf", 5)))
        .expect(1)
        .mount(&server)
        .await;

    let item = drive
        .upload_simple(
            "FOLDER",
            "a.pdf",
            b"alpha".to_vec(),
            photosync_core::ports::ConflictBehavior::Replace,
        )
        .await
        .unwrap();
    assert_eq!(item.id, "F1");
    assert_eq!(auth.calls(), 1);
}
