//! Local filesystem provider.

use std::fs;
use std::path::{Path, PathBuf};

use dav_server::localfs::LocalFs;
use dav_server::{DavConfig, DavMethodSet};
use tracing::{debug, info};

use super::{ProviderError, StorageProvider};
use crate::backend::BackendType;
use crate::config::{BackendConfig, LocalConfig};

/// Serves a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorageProvider {
    root: PathBuf,
    readonly: bool,
}

impl LocalStorageProvider {
    /// Create a provider rooted at `config.path`.
    ///
    /// A missing root directory is created. A root that exists but is not a
    /// directory is an error.
    pub fn new(config: &LocalConfig) -> Result<Self, ProviderError> {
        let root = config.path.clone();

        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ProviderError::NotADirectory { path: root }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&root).map_err(|source| ProviderError::Io {
                    path: root.clone(),
                    source,
                })?;
                info!(path = %root.display(), "Created local backend root");
            }
            Err(source) => return Err(ProviderError::Io { path: root, source }),
        }

        debug!(path = %root.display(), readonly = config.readonly, "Local provider ready");
        Ok(Self {
            root,
            readonly: config.readonly,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StorageProvider for LocalStorageProvider {
    fn backend_type(&self) -> BackendType {
        BackendType::Local
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn configure(&self, config: DavConfig) -> DavConfig {
        // Not public, case-sensitive, no macOS metadata hiding
        let config = config.filesystem(LocalFs::new(&self.root, false, false, false));
        if self.readonly {
            config.methods(DavMethodSet::WEBDAV_RO)
        } else {
            config
        }
    }
}

/// Registry constructor for [`BackendType::Local`].
pub(super) fn construct(config: &BackendConfig) -> Result<Box<dyn StorageProvider>, ProviderError> {
    match config {
        BackendConfig::Local(local) => Ok(Box::new(LocalStorageProvider::new(local)?)),
        other => Err(ProviderError::Mismatch {
            expected: BackendType::Local,
            actual: other.backend_type(),
        }),
    }
}
