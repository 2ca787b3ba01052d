//! HTTP server lifecycle management for WebDAV.
//!
//! This module provides the HTTP(S) server that serves a storage provider
//! over WebDAV and handles the server lifecycle (start, stop).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use dav_server::body::Body;
use dav_server::{DavHandler, fakels::FakeLs};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use oxdav_core::config::DEFAULT_HOST;
use oxdav_core::{StorageProvider, TlsMaterial, WebDavAuth};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::auth::BasicAuthGate;
use crate::error::{ServerError, ServerResult};
use crate::tls;

/// Configuration for the WebDAV server.
#[derive(Debug)]
pub struct ServerConfig {
    /// Host name or address to bind.
    pub host: String,
    /// Port to bind to (0 = auto-assign).
    pub port: u16,
    /// Client authentication.
    pub auth: WebDavAuth,
    /// Serve HTTPS with this certificate and key.
    pub tls: Option<TlsMaterial>,
    /// Server label, used as the Basic auth realm.
    pub label: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0, // Auto-assign
            auth: WebDavAuth::Anonymous,
            tls: None,
            label: "oxdav".to_string(),
        }
    }
}

/// Per-request state shared by all connections.
struct RequestHandler {
    dav: DavHandler,
    auth: Option<BasicAuthGate>,
}

impl RequestHandler {
    async fn handle(&self, req: Request<Incoming>) -> Response<Body> {
        if let Some(gate) = &self.auth
            && !gate.authorize(req.headers())
        {
            debug!(method = %req.method(), uri = %req.uri(), "Rejected unauthenticated request");
            return gate.challenge();
        }
        self.dav.handle(req).await
    }
}

/// A running WebDAV server instance.
pub struct WebDavServer {
    /// The actual bound address.
    pub addr: SocketAddr,
    /// Whether the server speaks HTTPS.
    tls: bool,
    /// Shutdown signal sender.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle.
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl WebDavServer {
    /// Start serving `provider`.
    ///
    /// Must be called from within a tokio runtime. TLS material is loaded
    /// before the socket is bound, so a bad certificate never leaves a
    /// listener behind.
    pub async fn start(provider: &dyn StorageProvider, config: ServerConfig) -> ServerResult<Self> {
        let acceptor = config.tls.as_ref().map(tls::load_acceptor).transpose()?;

        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind {
                addr: format!("{}:{}", config.host, config.port),
                source,
            })?;
        let actual_addr = listener.local_addr()?;

        info!(
            addr = %actual_addr,
            tls = acceptor.is_some(),
            readonly = provider.is_readonly(),
            auth = !config.auth.is_anonymous(),
            "Starting WebDAV server"
        );

        // FakeLs gives the minimal lock support macOS and Windows clients need
        let dav = provider
            .configure(DavHandler::builder())
            .locksystem(FakeLs::new())
            .build_handler();

        let handler = Arc::new(RequestHandler {
            dav,
            auth: BasicAuthGate::new(&config.auth, &config.label),
        });
        let tls = acceptor.is_some();

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        // Spawn the server task
        let server_handle = tokio::spawn(async move {
            tokio::select! {
                () = run_server(listener, acceptor, handler) => {
                    debug!("Server loop ended");
                }
                _ = shutdown_rx => {
                    info!("Received shutdown signal");
                }
            }
        });

        Ok(Self {
            addr: actual_addr,
            tls,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Get the URL for this server.
    pub fn url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.addr)
    }

    /// Stop the server.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        info!("WebDAV server stopped");
    }

    /// Stop the server synchronously (for use in Drop).
    fn stop_sync(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for WebDavServer {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

/// Run the server accept loop.
async fn run_server(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    handler: Arc<RequestHandler>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let handler = handler.clone();
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                serve_connection(tls_stream, peer_addr, handler).await;
                            }
                            Err(e) => warn!(peer = %peer_addr, error = %e, "TLS handshake failed"),
                        },
                        None => serve_connection(stream, peer_addr, handler).await,
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

/// Serve HTTP/1 or HTTP/2 on one accepted connection.
async fn serve_connection<S>(stream: S, peer_addr: SocketAddr, handler: Arc<RequestHandler>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(handler.handle(req).await) }
    });

    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
    {
        // With auto protocol negotiation, incomplete messages are
        // indistinguishable from real failures
        warn!(peer = %peer_addr, error = %e, "HTTP connection error");
    }
}
