//! Loading PEM material into a rustls acceptor.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use oxdav_core::TlsMaterial;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Build a TLS acceptor from a PEM certificate chain and private key.
pub(crate) fn load_acceptor(material: &TlsMaterial) -> ServerResult<TlsAcceptor> {
    let chain = load_cert_chain(&material.cert_path)?;
    let key = load_private_key(&material.key_path)?;

    let provider = rustls::crypto::ring::default_provider();
    let mut config = rustls::ServerConfig::builder_with_provider(provider.into())
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(chain, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    debug!(cert = %material.cert_path.display(), "Loaded TLS certificate");
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_pem(path: &Path) -> ServerResult<Vec<u8>> {
    fs::read(path).map_err(|source| ServerError::ReadPem {
        path: path.to_path_buf(),
        source,
    })
}

fn load_cert_chain(path: &Path) -> ServerResult<Vec<CertificateDer<'static>>> {
    let bytes = read_pem(path)?;
    let chain = CertificateDer::pem_slice_iter(&bytes)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ServerError::InvalidPem {
            path: path.to_path_buf(),
            source,
        })?;

    if chain.is_empty() {
        return Err(ServerError::EmptyCertificateChain {
            path: path.to_path_buf(),
        });
    }
    Ok(chain)
}

fn load_private_key(path: &Path) -> ServerResult<PrivateKeyDer<'static>> {
    let bytes = read_pem(path)?;
    PrivateKeyDer::from_pem_slice(&bytes).map_err(|source| ServerError::InvalidPem {
        path: path.to_path_buf(),
        source,
    })
}
