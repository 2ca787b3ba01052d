//! Integration tests for the WebDAV server over a local provider.
//!
//! Covers:
//! - Read and write through the local filesystem
//! - The read-only method set
//! - The Basic auth gate
//! - HTTPS with a generated certificate

mod common;

use common::{TEST_PASSWORD, TEST_USER, TestServer, assert_file_content};
use reqwest::{Method, StatusCode};

// ============================================================================
// Read-write
// ============================================================================

#[tokio::test]
async fn test_put_then_get() {
    let server = TestServer::anonymous().await;

    server.put_ok("/hello.txt", b"Hello, WebDAV".to_vec()).await;
    assert_file_content(&server, "/hello.txt", b"Hello, WebDAV").await;

    // Written through to the served directory
    let on_disk = std::fs::read(server.root().join("hello.txt")).unwrap();
    assert_eq!(on_disk, b"Hello, WebDAV");
}

#[tokio::test]
async fn test_existing_files_are_served() {
    let server = TestServer::anonymous().await;
    assert_file_content(&server, "/existing.txt", b"already here").await;
}

#[tokio::test]
async fn test_mkcol_and_propfind_listing() {
    let server = TestServer::anonymous().await;

    let resp = server.mkcol("/docs").await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    server.put_ok("/docs/a.txt", b"a".to_vec()).await;

    let (status, body) = server.propfind_body("/docs/", "1").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert!(body.contains("a.txt"), "listing missing a.txt: {body}");
}

#[tokio::test]
async fn test_delete_removes_file() {
    let server = TestServer::anonymous().await;
    server.put_ok("/gone.txt", b"bye".to_vec()).await;

    let resp = server.delete("/gone.txt").await;
    assert!(resp.status().is_success());
    assert_eq!(server.get("/gone.txt").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stop_shuts_down_listener() {
    let server = TestServer::anonymous().await;
    let url = server.url("/existing.txt");
    server.stop().await;

    let result = reqwest::Client::new().get(url).send().await;
    assert!(result.is_err(), "server still answering after stop");
}

// ============================================================================
// Read-only
// ============================================================================

#[tokio::test]
async fn test_readonly_serves_reads() {
    let server = TestServer::readonly().await;
    assert_file_content(&server, "/existing.txt", b"already here").await;

    let (status, _) = server.propfind_body("/", "1").await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
}

#[tokio::test]
async fn test_readonly_rejects_writes() {
    let server = TestServer::readonly().await;

    let resp = server.put("/new.txt", b"nope".to_vec()).await;
    assert!(
        !resp.status().is_success(),
        "PUT succeeded on read-only server: {}",
        resp.status()
    );
    assert!(!server.root().join("new.txt").exists());

    assert!(!server.delete("/existing.txt").await.status().is_success());
    assert!(!server.mkcol("/dir").await.status().is_success());
    assert!(server.root().join("existing.txt").exists());
}

// ============================================================================
// Basic auth
// ============================================================================

#[tokio::test]
async fn test_missing_credentials_get_challenge() {
    let server = TestServer::with_basic_auth().await;

    let resp = server
        .anonymous_request(Method::GET, "/existing.txt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let challenge = resp.headers()["www-authenticate"].to_str().unwrap();
    assert_eq!(challenge, "Basic realm=\"oxdav (test)\"");
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let server = TestServer::with_basic_auth().await;

    let resp = server
        .anonymous_request(Method::GET, "/existing.txt")
        .basic_auth(TEST_USER, Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_credentials_are_accepted() {
    let server = TestServer::with_basic_auth().await;

    let resp = server
        .anonymous_request(Method::GET, "/existing.txt")
        .basic_auth(TEST_USER, Some(TEST_PASSWORD))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    server.put_ok("/authed.txt", b"ok".to_vec()).await;
    assert_file_content(&server, "/authed.txt", b"ok").await;
}

// ============================================================================
// TLS
// ============================================================================

#[tokio::test]
async fn test_https_round_trip() {
    let server = TestServer::with_tls().await;
    assert!(server.base_url.starts_with("https://"));

    server.put_ok("/secure.txt", b"over tls".to_vec()).await;
    assert_file_content(&server, "/secure.txt", b"over tls").await;
}

#[tokio::test]
async fn test_plain_http_is_not_served_on_tls_port() {
    let server = TestServer::with_tls().await;
    let plain_url = server.url("/existing.txt").replacen("https://", "http://", 1);

    let result = reqwest::Client::new().get(plain_url).send().await;
    assert!(
        !result.is_ok_and(|resp| resp.status().is_success()),
        "plain HTTP request succeeded against the HTTPS listener"
    );
}
