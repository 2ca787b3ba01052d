//! Errors raised while starting the WebDAV server.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Server startup errors. Once the server is running, per-connection
/// failures are logged instead of returned.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listening socket.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Could not read a certificate or key file.
    #[error("Failed to read {}: {source}", path.display())]
    ReadPem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A certificate or key file is not valid PEM.
    #[error("Invalid PEM in {}: {source}", path.display())]
    InvalidPem {
        path: PathBuf,
        #[source]
        source: rustls::pki_types::pem::Error,
    },

    /// The certificate file holds no certificates.
    #[error("No certificates found in {}", path.display())]
    EmptyCertificateChain { path: PathBuf },

    /// rustls rejected the certificate/key pair.
    #[error("Invalid TLS configuration: {0}")]
    Tls(#[from] rustls::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
