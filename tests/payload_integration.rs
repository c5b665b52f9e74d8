//! Integration tests for payload downloads.
//!
//! These tests verify the streaming download and temp-file cleanup with a
//! mock HTTP server.

use relay_core::payload::{PayloadClient, PayloadError};
use relay_core::INLINE_SIZE_LIMIT;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_mock_file(path_str: &str, content: &[u8]) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_fetch_preserves_content_and_size() {
    let content = b"GIF89a fake animation frames";
    let server = setup_mock_file("/media/loop.gif", content).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let client = PayloadClient::new().expect("client");
    let payload = client
        .fetch(&format!("{}/media/loop.gif", server.uri()), temp_dir.path(), INLINE_SIZE_LIMIT)
        .await
        .expect("download should succeed");

    assert_eq!(payload.file_name(), "loop.gif");
    assert_eq!(payload.size(), content.len() as u64);
    assert_eq!(payload.path(), temp_dir.path().join("loop.gif"));
    assert_eq!(payload.read().await.expect("read"), content);
}

#[tokio::test]
async fn test_dropping_payload_removes_file() {
    let server = setup_mock_file("/a.png", b"png").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let client = PayloadClient::new().expect("client");
    let payload = client
        .fetch(&format!("{}/a.png", server.uri()), temp_dir.path(), INLINE_SIZE_LIMIT)
        .await
        .expect("download should succeed");
    let file = payload.path().to_path_buf();
    assert!(file.exists());

    drop(payload);
    assert!(!file.exists(), "temp payload must be removed on drop");
}

#[tokio::test]
async fn test_percent_encoded_name_is_decoded() {
    let server = setup_mock_file("/my%20cat.jpg", b"jpeg").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let payload = PayloadClient::new()
        .expect("client")
        .fetch(&format!("{}/my%20cat.jpg", server.uri()), temp_dir.path(), INLINE_SIZE_LIMIT)
        .await
        .expect("download should succeed");
    assert_eq!(payload.file_name(), "my cat.jpg");
}

#[tokio::test]
async fn test_http_error_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let result = PayloadClient::new()
        .expect("client")
        .fetch(&format!("{}/gone.png", server.uri()), temp_dir.path(), INLINE_SIZE_LIMIT)
        .await;

    assert!(matches!(result, Err(PayloadError::HttpStatus { status: 404, .. })));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_body_over_limit_stops_one_byte_past_it() {
    let limit: u64 = 64 * 1024;
    let body = vec![7u8; 2 * 1024 * 1024];
    let server = setup_mock_file("/huge.gif", &body).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let payload = PayloadClient::new()
        .expect("client")
        .fetch(&format!("{}/huge.gif", server.uri()), temp_dir.path(), limit)
        .await
        .expect("download should succeed");

    assert!(payload.is_over_limit());
    assert_eq!(payload.size(), limit + 1);
    let on_disk = std::fs::metadata(payload.path()).expect("temp file").len();
    assert_eq!(on_disk, limit + 1, "reading stops right after the limit");
    assert_eq!(payload.reported_size(), body.len() as u64);
}

#[tokio::test]
async fn test_body_at_limit_is_not_over() {
    let server = setup_mock_file("/fits.png", &[1u8; 4096]).await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    let payload = PayloadClient::new()
        .expect("client")
        .fetch(&format!("{}/fits.png", server.uri()), temp_dir.path(), 4096)
        .await
        .expect("download should succeed");

    assert!(!payload.is_over_limit());
    assert_eq!(payload.size(), 4096);
}

#[tokio::test]
async fn test_existing_file_with_same_name_is_left_alone() {
    let server = setup_mock_file("/a.png", b"downloaded").await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let existing = temp_dir.path().join("a.png");
    std::fs::write(&existing, b"operator file").expect("seed");

    let payload = PayloadClient::new()
        .expect("client")
        .fetch(&format!("{}/a.png", server.uri()), temp_dir.path(), INLINE_SIZE_LIMIT)
        .await
        .expect("download should succeed");

    assert_ne!(payload.path(), existing);
    assert_eq!(payload.path(), temp_dir.path().join("a_1.png"));
    assert_eq!(payload.file_name(), "a.png", "attachment name is unchanged");
    assert_eq!(payload.read().await.expect("read"), b"downloaded");

    drop(payload);
    assert_eq!(std::fs::read(&existing).expect("still there"), b"operator file");
    assert!(!temp_dir.path().join("a_1.png").exists());
}
