//! Persistent store of named backends.
//!
//! Backends are kept in a single TOML file, one table per backend:
//!
//! ```toml
//! [photos]
//! type = "local"
//! path = "/srv/photos"
//! readonly = true
//!
//! [drime-personal]
//! type = "drime"
//! api_key = "<obscured token>"
//! workspace_id = 0
//! ```
//!
//! The file lives at `~/.config/oxdav/backends.toml` (XDG standard) or
//! `~/Library/Application Support/oxdav/backends.toml` on macOS. Set
//! `OXDAV_CONFIG_DIR` to use another directory.
//!
//! # Concurrency
//!
//! Every query reads the whole file and every mutation rewrites it. There is
//! no locking: two processes mutating the store at once race, and the last
//! writer wins.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{BackendRecord, BackendType, FieldValue, Fields, is_sensitive};
use crate::obscure;

/// Name of the store file inside the config directory
pub const STORE_FILE_NAME: &str = "backends.toml";

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "OXDAV_CONFIG_DIR";

/// Field holding the backend type tag
const TYPE_KEY: &str = "type";

/// Header written at the top of the store file
const FILE_HEADER: &str = "# oxdav backend configuration.\n\
# Secret fields are obscured, not encrypted. Keep this file private.\n\n";

/// On-disk layout: backend name -> field table (including `type`)
type StoreFile = BTreeMap<String, BTreeMap<String, FieldValue>>;

/// Errors that can occur while reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Could not determine the user configuration directory; set OXDAV_CONFIG_DIR")]
    NoConfigDir,

    #[error("Failed to read backend store {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file exists but is not a valid store. Never silently replaced.
    #[error(
        "Backend store {} is malformed: {source}\n\n\
         Fix the file by hand or move it aside, then re-add your backends.",
        path.display()
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Backend '{name}' in {} has a non-string type", path.display())]
    InvalidType { name: String, path: PathBuf },

    #[error("Failed to serialize backend store: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write backend store {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Backend name cannot be empty")]
    EmptyName,

    #[error("Backend '{name}': 'type' is reserved and cannot be used as a field")]
    ReservedField { name: String },
}

/// Get the default config directory.
///
/// Uses `OXDAV_CONFIG_DIR` if set, otherwise `<user config dir>/oxdav`.
pub fn default_config_dir() -> Result<PathBuf, StoreError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let base_dirs = directories::BaseDirs::new().ok_or(StoreError::NoConfigDir)?;
    Ok(base_dirs.config_dir().join("oxdav"))
}

/// Named collection of backend records backed by one TOML file.
#[derive(Debug, Clone)]
pub struct BackendStore {
    path: PathBuf,
}

impl BackendStore {
    /// Open the store at the default location.
    ///
    /// The file is not touched until the first query.
    pub fn open_default() -> Result<Self, StoreError> {
        Ok(Self::in_dir(default_config_dir()?))
    }

    /// Open the store file inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::at(dir.as_ref().join(STORE_FILE_NAME))
    }

    /// Open the store at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all stored backends, in alphabetical order.
    pub fn list_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.into_keys().collect())
    }

    /// All stored backends, in alphabetical order.
    pub fn records(&self) -> Result<Vec<BackendRecord>, StoreError> {
        self.load()?
            .into_iter()
            .map(|(name, table)| self.to_record(name, table))
            .collect()
    }

    /// Get a backend by name. `None` means "not configured", not an error.
    pub fn get(&self, name: &str) -> Result<Option<BackendRecord>, StoreError> {
        let mut file = self.load()?;
        file.remove(name)
            .map(|table| self.to_record(name.to_string(), table))
            .transpose()
    }

    /// Check whether a backend with this name exists.
    pub fn has(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.load()?.contains_key(name))
    }

    /// Add a backend, or replace an existing one with the same name.
    ///
    /// The stored record is exactly `{type} ∪ fields`; nothing of the previous
    /// record survives. With `obscure_secrets`, sensitive string fields are
    /// obscured unless they already are, so re-saving a loaded record never
    /// double-encodes.
    pub fn add_or_update(
        &self,
        name: &str,
        backend_type: BackendType,
        fields: Fields,
        obscure_secrets: bool,
    ) -> Result<(), StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        if fields.contains_key(TYPE_KEY) {
            return Err(StoreError::ReservedField {
                name: name.to_string(),
            });
        }

        let mut table: BTreeMap<String, FieldValue> = fields
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    FieldValue::String(s)
                        if obscure_secrets && is_sensitive(&key) && !obscure::is_obscured(&s) =>
                    {
                        FieldValue::String(obscure::obscure(&s))
                    }
                    other => other,
                };
                (key, value)
            })
            .collect();
        table.insert(
            TYPE_KEY.to_string(),
            FieldValue::String(backend_type.as_str().to_string()),
        );

        let mut file = self.load()?;
        let replaced = file.insert(name.to_string(), table).is_some();
        self.save(&file)?;

        info!(
            backend = %name,
            backend_type = %backend_type,
            replaced,
            "Saved backend"
        );
        Ok(())
    }

    /// Remove a backend. Returns `false` if it did not exist.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let mut file = self.load()?;
        if file.remove(name).is_none() {
            return Ok(false);
        }
        self.save(&file)?;
        info!(backend = %name, "Removed backend");
        Ok(true)
    }

    /// Names of backends of the given type, in alphabetical order.
    pub fn filter_by_type(&self, backend_type: BackendType) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|record| record.backend_type() == Some(backend_type))
            .map(|record| record.name().to_string())
            .collect())
    }

    fn to_record(
        &self,
        name: String,
        mut table: BTreeMap<String, FieldValue>,
    ) -> Result<BackendRecord, StoreError> {
        let type_tag = match table.remove(TYPE_KEY) {
            None => BackendType::Local.as_str().to_string(),
            Some(FieldValue::String(tag)) => tag,
            Some(_) => {
                return Err(StoreError::InvalidType {
                    name,
                    path: self.path.clone(),
                });
            }
        };
        Ok(BackendRecord::new(name, type_tag, table))
    }

    fn load(&self) -> Result<StoreFile, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No backend store yet");
                return Ok(StoreFile::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        toml::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, file: &StoreFile) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        let mut contents = String::from(FILE_HEADER);
        contents.push_str(&toml::to_string_pretty(file)?);

        // Write to a sibling temp file and rename, so a crash never leaves a
        // truncated store behind
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(contents.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        debug!(path = %self.path.display(), backends = file.len(), "Wrote backend store");
        Ok(())
    }
}
