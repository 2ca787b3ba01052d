//! Storage provider abstraction
//!
//! A storage provider is the filesystem view a WebDAV server serves. This
//! module defines the capability every provider offers and a registry that
//! maps each [`BackendType`] to a constructor.
//!
//! # Architecture
//!
//! - [`StorageProvider`]: A constructed provider, ready to be installed into a
//!   DAV handler
//! - [`ProviderRegistry`]: Which backend types this build can construct
//!
//! Optional providers (Drime) live outside this crate. They join a registry
//! through [`ProviderRegistry::register`]; a type without a constructor
//! resolves to a "not available" error instead of failing at link time.
//!
//! # Example
//!
//! ```ignore
//! use oxdav_core::provider::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_builtin();
//! let construct = registry.get(config.backend_type()).ok_or(...)?;
//! let provider = construct(&config)?;
//! let handler = provider.configure(DavHandler::builder()).build_handler();
//! ```

pub mod local;

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;

use dav_server::DavConfig;
use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendType;
use crate::config::BackendConfig;

pub use local::LocalStorageProvider;

/// Errors raised while constructing a provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The configured root exists but is not a directory
    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// Filesystem error while preparing the provider
    #[error("Failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A constructor was handed a configuration for another backend type
    #[error("Provider for {expected} was given a {actual} configuration")]
    Mismatch {
        expected: BackendType,
        actual: BackendType,
    },

    /// The provider rejected its configuration (bad credentials, unreachable service, ...)
    #[error("{0}")]
    Rejected(String),
}

/// A configured storage provider
///
/// Implementations hold everything needed to serve their backend. They are
/// built once per server run and must be shareable across request tasks.
pub trait StorageProvider: Send + Sync + fmt::Debug {
    /// The backend type this provider serves
    fn backend_type(&self) -> BackendType;

    /// Where the served data lives (a path, a workspace), for labels and banners
    fn location(&self) -> String;

    /// Whether write methods must be rejected
    fn is_readonly(&self) -> bool;

    /// Install this provider's filesystem into a DAV handler configuration
    ///
    /// Read-only providers also restrict the handler to read-only methods.
    fn configure(&self, config: DavConfig) -> DavConfig;
}

/// Function building a provider from its typed configuration
pub type ProviderConstructor =
    fn(&BackendConfig) -> Result<Box<dyn StorageProvider>, ProviderError>;

/// Serializable snapshot of a backend type's availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    /// Type tag (e.g., "local", "drime")
    pub id: String,
    /// Human-readable name (e.g., "Local", "Drime")
    pub name: String,
    /// Backend type enum value
    pub backend_type: BackendType,
    /// Brief description of the backend
    pub description: String,
    /// Whether this build can construct the provider
    pub available: bool,
    /// Why the provider is unavailable, if applicable
    pub unavailable_reason: Option<String>,
}

/// Maps backend types to provider constructors
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: BTreeMap<BackendType, ProviderConstructor>,
}

impl ProviderRegistry {
    /// A registry with no providers
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with the providers compiled into this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(BackendType::Local, local::construct);
        registry
    }

    /// Register (or replace) the constructor for a backend type
    pub fn register(&mut self, backend_type: BackendType, constructor: ProviderConstructor) {
        self.constructors.insert(backend_type, constructor);
    }

    /// Whether a constructor is registered for the type
    pub fn is_registered(&self, backend_type: BackendType) -> bool {
        self.constructors.contains_key(&backend_type)
    }

    /// Get the constructor for a backend type
    pub fn get(&self, backend_type: BackendType) -> Option<ProviderConstructor> {
        self.constructors.get(&backend_type).copied()
    }

    /// Availability of every known backend type, in declaration order
    pub fn info(&self) -> Vec<ProviderInfo> {
        BackendType::all()
            .iter()
            .map(|&backend_type| {
                let available = self.is_registered(backend_type);
                ProviderInfo {
                    id: backend_type.as_str().to_string(),
                    name: backend_type.display_name().to_string(),
                    backend_type,
                    description: backend_type.description().to_string(),
                    available,
                    unavailable_reason: (!available).then(|| {
                        format!(
                            "The {} provider requires extra installation",
                            backend_type.display_name()
                        )
                    }),
                }
            })
            .collect()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("registered", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
