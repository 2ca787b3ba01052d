//! WebDAV server bootstrap for oxdav storage providers.
//!
//! Takes a provider resolved by [`oxdav_core::Dispatcher`] and serves it
//! over HTTP or HTTPS:
//!
//! 1. The provider installs its filesystem into a `dav-server` handler
//! 2. An optional HTTP Basic auth gate runs in front of the handler
//! 3. Connections are served with hyper (HTTP/1 and HTTP/2), optionally
//!    behind rustls
//!
//! # Example
//!
//! ```ignore
//! use oxdav_webdav::{ServerConfig, WebDavServer};
//!
//! let resolved = dispatcher.resolve(request)?;
//! let config = ServerConfig {
//!     host: resolved.connection.host.clone(),
//!     port: resolved.connection.port,
//!     auth: resolved.auth,
//!     tls: resolved.connection.tls.clone(),
//!     label: resolved.label.clone(),
//! };
//! let server = WebDavServer::start(resolved.provider.as_ref(), config).await?;
//! println!("Serving at {}", server.url());
//!
//! tokio::signal::ctrl_c().await?;
//! server.stop().await;
//! ```
//!
//! # Security
//!
//! By default the server binds to localhost (127.0.0.1) only. Basic auth
//! sends credentials in the clear unless TLS is enabled.

mod auth;
mod error;
mod server;
mod tls;

// Public exports
pub use error::{ServerError, ServerResult};
pub use server::{ServerConfig, WebDavServer};
