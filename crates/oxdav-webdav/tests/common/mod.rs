//! Test server harness for WebDAV integration tests.
//!
//! Provides a `TestServer` that serves a temporary directory through the
//! local provider, along with HTTP convenience methods.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use oxdav_core::config::LocalConfig;
use oxdav_core::provider::LocalStorageProvider;
use oxdav_core::{TlsMaterial, WebDavAuth};
use oxdav_webdav::{ServerConfig, WebDavServer};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::SecretString;
use tempfile::TempDir;

pub const TEST_USER: &str = "alice";
pub const TEST_PASSWORD: &str = "test-password-12345";

/// Test server with HTTP client and automatic cleanup.
pub struct TestServer {
    /// The running WebDAV server.
    server: WebDavServer,
    /// HTTP client for making requests.
    client: Client,
    /// Base URL for the server.
    pub base_url: String,
    /// Credentials sent with every request, if any.
    credentials: Option<(String, String)>,
    /// Served directory (cleaned up on drop).
    root: TempDir,
    /// Generated certificate and key, when serving HTTPS.
    certs: Option<TempDir>,
}

impl TestServer {
    /// Start a read-write, anonymous server over a fresh directory.
    pub async fn anonymous() -> Self {
        Self::start(false, WebDavAuth::Anonymous, false).await
    }

    /// Start a read-only, anonymous server over a fresh directory.
    pub async fn readonly() -> Self {
        Self::start(true, WebDavAuth::Anonymous, false).await
    }

    /// Start a server that requires `TEST_USER` / `TEST_PASSWORD`.
    pub async fn with_basic_auth() -> Self {
        let auth = WebDavAuth::Basic {
            username: TEST_USER.to_string(),
            password: SecretString::from(TEST_PASSWORD.to_string()),
        };
        Self::start(false, auth, false).await
    }

    /// Start an anonymous server over HTTPS with a self-signed certificate.
    pub async fn with_tls() -> Self {
        Self::start(false, WebDavAuth::Anonymous, true).await
    }

    async fn start(readonly: bool, auth: WebDavAuth, https: bool) -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(root.path().join("existing.txt"), b"already here")
            .expect("Failed to seed file");

        let provider = LocalStorageProvider::new(&LocalConfig {
            path: root.path().to_path_buf(),
            readonly,
        })
        .expect("Failed to create provider");

        let credentials = match &auth {
            WebDavAuth::Anonymous => None,
            WebDavAuth::Basic { username, .. } => {
                Some((username.clone(), TEST_PASSWORD.to_string()))
            }
        };

        let certs = https.then(generate_localhost_cert);
        let tls = certs.as_ref().map(|dir| TlsMaterial {
            cert_path: dir.path().join("cert.pem"),
            key_path: dir.path().join("key.pem"),
        });

        // Start server on random port
        let config = ServerConfig {
            auth,
            tls,
            label: "oxdav (test)".to_string(),
            ..ServerConfig::default()
        };
        let server = WebDavServer::start(&provider, config)
            .await
            .expect("Failed to start WebDAV server");

        let base_url = server.url();

        // The generated certificate is self-signed
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .danger_accept_invalid_certs(https)
            .build()
            .expect("Failed to create HTTP client");

        let test_server = Self {
            server,
            client,
            base_url,
            credentials,
            root,
            certs,
        };

        // Wait for server to be ready
        test_server.wait_ready().await;

        test_server
    }

    /// Wait for the server to be ready to accept connections.
    async fn wait_ready(&self) {
        for _ in 0..50 {
            if let Ok(resp) = self
                .request(Method::from_bytes(b"PROPFIND").unwrap(), "/")
                .header("Depth", "0")
                .send()
                .await
            {
                if resp.status().is_success() || resp.status() == StatusCode::MULTI_STATUS {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready in time");
    }

    /// Directory served at `/`.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Build a full URL from a path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request with the server's credentials attached.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    /// Request without any credentials.
    pub fn anonymous_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    // ========== HTTP Convenience Methods ==========

    /// GET a file's contents.
    pub async fn get(&self, path: &str) -> Response {
        self.request(Method::GET, path)
            .send()
            .await
            .expect("GET request failed")
    }

    /// PUT file contents.
    pub async fn put(&self, path: &str, body: impl Into<reqwest::Body>) -> Response {
        self.request(Method::PUT, path)
            .body(body)
            .send()
            .await
            .expect("PUT request failed")
    }

    /// PUT file contents and assert success.
    pub async fn put_ok(&self, path: &str, body: impl Into<reqwest::Body>) {
        let resp = self.put(path, body).await;
        let status = resp.status();
        assert!(
            status.is_success(),
            "PUT {} failed with status {}: {}",
            path,
            status,
            resp.text().await.unwrap_or_default()
        );
    }

    /// DELETE a file or directory.
    pub async fn delete(&self, path: &str) -> Response {
        self.request(Method::DELETE, path)
            .send()
            .await
            .expect("DELETE request failed")
    }

    /// MKCOL (create directory).
    pub async fn mkcol(&self, path: &str) -> Response {
        self.request(Method::from_bytes(b"MKCOL").unwrap(), path)
            .send()
            .await
            .expect("MKCOL request failed")
    }

    /// PROPFIND and return body as string.
    pub async fn propfind_body(&self, path: &str, depth: &str) -> (StatusCode, String) {
        let resp = self
            .request(Method::from_bytes(b"PROPFIND").unwrap(), path)
            .header("Depth", depth)
            .send()
            .await
            .expect("PROPFIND request failed");
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        (status, body)
    }

    /// Stop the server explicitly.
    pub async fn stop(self) {
        self.server.stop().await;
    }
}

/// Write a self-signed certificate for `localhost` and its key as PEM.
fn generate_localhost_cert() -> TempDir {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("Failed to generate certificate");
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join("cert.pem"), certified.cert.pem())
        .expect("Failed to write certificate");
    std::fs::write(dir.path().join("key.pem"), certified.key_pair.serialize_pem())
        .expect("Failed to write private key");
    dir
}

/// Assert that a GET returns exactly `expected`.
pub async fn assert_file_content(server: &TestServer, path: &str, expected: &[u8]) {
    let resp = server.get(path).await;
    assert_eq!(resp.status(), StatusCode::OK, "GET {path} failed");
    let body = resp.bytes().await.expect("Failed to read response bytes");
    assert_eq!(body.as_ref(), expected, "Content mismatch for {path}");
}
