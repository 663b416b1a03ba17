//! Integration tests for simple uploads and upload sessions

use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use photosync_core::domain::DriveError;
use photosync_core::ports::{ChunkAck, ConflictBehavior, UploadSession};

use crate::common;

#[tokio::test]
async fn test_upload_simple_sends_conflict_behavior() {
    let (server, drive) = common::setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/me/drive/items/FOLDER1:/doc.pdf:/content"))
        .and(query_param("@microsoft.graph.conflictBehavior", "replace"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_json("NEW1", "doc.pdf", 5)))
        .expect(1)
        .mount(&server)
        .await;

    let item = drive
        .upload_simple("FOLDER1", "doc.pdf", b"hello".to_vec(), ConflictBehavior::Replace)
        .await
        .unwrap();
    assert_eq!(item.id, "NEW1");
    assert_eq!(item.size, 5);
}

#[tokio::test]
async fn test_upload_simple_fail_behavior_conflict() {
    let (server, drive) = common::setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/me/drive/items/FOLDER1:/doc.pdf:/content"))
        .and(query_param("@microsoft.graph.conflictBehavior", "fail"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = drive
        .upload_simple("FOLDER1", "doc.pdf", b"hello".to_vec(), ConflictBehavior::Fail)
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::Conflict(_)));
}

#[tokio::test]
async fn test_quota_exceeded_is_not_transient() {
    let (server, drive) = common::setup_drive_mock().await;

    Mock::given(method("PUT"))
        .and(path("/me/drive/items/FOLDER1:/doc.pdf:/content"))
        .respond_with(ResponseTemplate::new(507).set_body_json(serde_json::json!({
            "error": { "code": "quotaLimitReached", "message": "Insufficient Space" }
        })))
        .mount(&server)
        .await;

    let err = drive
        .upload_simple("FOLDER1", "doc.pdf", b"hello".to_vec(), ConflictBehavior::Replace)
        .await
        .unwrap_err();
    assert!(matches!(err, DriveError::QuotaOrPermission(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_upload_session_lifecycle() {
    let (server, drive) = common::setup_drive_mock().await;
    let upload_url = format!("{}/upload-session/abc", server.uri());

    Mock::given(method("POST"))
        .and(path("/me/drive/items/FOLDER1:/big.mov:/createUploadSession"))
        .and(body_json(serde_json::json!({
            "item": { "@microsoft.graph.conflictBehavior": "replace", "name": "big.mov" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": upload_url,
            "expirationDateTime": "2030-01-01T00:00:00Z",
            "nextExpectedRanges": ["0-"]
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .and(header("content-range", "bytes 0-3/8"))
        .respond_with(ResponseTemplate::new(202).set_body_json(serde_json::json!({
            "nextExpectedRanges": ["4-"]
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .and(header("content-range", "bytes 4-7/8"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_json("BIG1", "big.mov", 8)))
        .mount(&server)
        .await;

    let session = drive
        .upload_session_start("FOLDER1", "big.mov", ConflictBehavior::Replace)
        .await
        .unwrap();
    assert_eq!(session.upload_url, upload_url);
    assert!(session.expires_at.is_some());

    let first = drive
        .upload_session_append(&session, 0, 8, b"abcd".to_vec())
        .await
        .unwrap();
    assert_eq!(first, ChunkAck::Accepted { next_offset: 4 });

    let last = drive
        .upload_session_append(&session, 4, 8, b"efgh".to_vec())
        .await
        .unwrap();
    match last {
        ChunkAck::Completed(item) => {
            assert_eq!(item.id, "BIG1");
            assert_eq!(item.size, 8);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_chunk_server_error_is_transient() {
    let (server, drive) = common::setup_drive_mock().await;
    let session = UploadSession {
        upload_url: format!("{}/upload-session/abc", server.uri()),
        expires_at: None,
    };

    Mock::given(method("PUT"))
        .and(path("/upload-session/abc"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = drive
        .upload_session_append(&session, 0, 8, b"abcd".to_vec())
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_cancel_session_tolerates_missing_session() {
    let (server, drive) = common::setup_drive_mock().await;
    let session = UploadSession {
        upload_url: format!("{}/upload-session/gone", server.uri()),
        expires_at: None,
    };

    Mock::given(method("DELETE"))
        .and(path("/upload-session/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    drive.upload_session_cancel(&session).await.unwrap();
}
