//! Backend configuration and provider resolution for the oxdav WebDAV server.
//!
//! # Overview
//!
//! - [`store::BackendStore`] persists named backends (type plus fields) in a
//!   TOML file, with secret fields obscured by [`obscure`].
//! - [`dispatch::Dispatcher`] turns a backend identifier and command-line
//!   overrides into a [`provider::StorageProvider`] ready to be served.
//! - [`provider::ProviderRegistry`] decides which backend types this build
//!   can serve.
//!
//! # Example
//!
//! ```no_run
//! use oxdav_core::{BackendStore, Dispatcher, ProviderRegistry, ResolutionRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = BackendStore::open_default()?;
//! let registry = ProviderRegistry::with_builtin();
//! let resolved = Dispatcher::new(&store, &registry).resolve(ResolutionRequest::new("photos"))?;
//! println!("Serving {}", resolved.label);
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! Obscured secrets are **not encrypted**: the key is part of every binary.
//! The store file is written with mode 0600 on Unix; keep it that way.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod obscure;
pub mod provider;
pub mod store;

pub use backend::{BackendRecord, BackendType, FieldValue, Fields};
pub use config::{BackendConfig, ConfigError, DrimeConfig, LocalConfig};
pub use dispatch::{
    DispatchError, Dispatcher, ResolutionRequest, ResolvedProvider, TlsMaterial, WebDavAuth,
};
pub use provider::{ProviderError, ProviderRegistry, StorageProvider};
pub use store::{BackendStore, StoreError};
