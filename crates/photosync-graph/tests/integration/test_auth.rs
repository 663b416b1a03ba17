//! Integration tests for the device-code authenticator

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use photosync_core::domain::AuthError;
use photosync_core::ports::{IAuthenticator, Tokens};
use photosync_graph::{DeviceCodeAuthenticator, FileTokenStore, TokenStore};

fn authenticator(
    server: &MockServer,
    store: Arc<FileTokenStore>,
    timeout: Duration,
) -> DeviceCodeAuthenticator {
    DeviceCodeAuthenticator::new("client-123", store, timeout)
        .unwrap()
        .with_endpoints(
            format!("{}/devicecode", server.uri()),
            format!("{}/token", server.uri()),
        )
}

async fn mount_device_code(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/devicecode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "device_code": "DEVICE-CODE",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 1
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_valid_stored_token_is_reused_without_network() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::new(dir.path()));
    store
        .save(
            "scans",
            &Tokens {
                access_token: "still-good".into(),
                refresh_token: Some("r".into()),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        )
        .unwrap();

    let auth = authenticator(&server, store, Duration::from_secs(5));
    let token = auth.get_access_token("scans").await.unwrap();

    assert_eq!(token, "still-good");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_and_saved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::new(dir.path()));
    store
        .save(
            "scans",
            &Tokens {
                access_token: "stale".into(),
                refresh_token: Some("keep-me".into()),
                expires_at: Utc::now() + chrono::Duration::minutes(1),
            },
        )
        .unwrap();

    let auth = authenticator(&server, store.clone(), Duration::from_secs(5));
    assert_eq!(auth.get_access_token("scans").await.unwrap(), "fresh");

    let saved = store.load("scans").unwrap().unwrap();
    assert_eq!(saved.access_token, "fresh");
    assert_eq!(saved.refresh_token.as_deref(), Some("keep-me"));
}

#[tokio::test]
async fn test_device_flow_success() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "device-token",
            "refresh_token": "device-refresh",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::new(dir.path()));
    let auth = authenticator(&server, store.clone(), Duration::from_secs(10));

    let tokens = auth.login("scans", false).await.unwrap();
    assert_eq!(tokens.access_token, "device-token");
    assert!(store.token_path("scans").exists());
}

#[tokio::test]
async fn test_device_flow_times_out() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "authorization_pending",
            "error_description": "User has not yet signed in"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::new(dir.path()));
    let auth = authenticator(&server, store.clone(), Duration::from_secs(2));

    let err = auth.login("scans", false).await.unwrap_err();
    assert!(matches!(err, AuthError::Timeout(2)));
    assert!(store.load("scans").unwrap().is_none());
}

#[tokio::test]
async fn test_device_flow_denied() {
    let server = MockServer::start().await;
    mount_device_code(&server).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "access_denied",
            "error_description": "The user declined"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let auth = authenticator(
        &server,
        Arc::new(FileTokenStore::new(dir.path())),
        Duration::from_secs(10),
    );

    let err = auth.login("scans", false).await.unwrap_err();
    assert!(matches!(err, AuthError::Denied(_)));
}

#[tokio::test]
async fn test_logout_removes_tokens() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::new(dir.path()));
    store
        .save(
            "scans",
            &Tokens {
                access_token: "a".into(),
                refresh_token: None,
                expires_at: Utc::now(),
            },
        )
        .unwrap();

    let auth = authenticator(&server, store.clone(), Duration::from_secs(5));
    auth.logout("scans").unwrap();
    assert!(store.load("scans").unwrap().is_none());
}
