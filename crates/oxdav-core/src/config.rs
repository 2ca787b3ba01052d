//! Typed per-backend configuration decoded from stored field maps.
//!
//! The store keeps a loose `key -> value` map per backend so that new
//! backend types need no schema migration. Dispatch works on the structs in
//! this module instead, so every field is validated once, up front.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::backend::{BackendRecord, BackendType, FieldValue};

/// Default bind address for the WebDAV server
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port for the WebDAV server
pub const DEFAULT_PORT: u16 = 8080;

/// Default root directory for the local backend
pub const DEFAULT_PATH: &str = "/tmp/webdav";

/// Default metadata cache TTL for remote backends
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Default upload size limit for remote backends (500 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Default Drime workspace (0 = personal)
pub const DEFAULT_WORKSPACE_ID: u64 = 0;

/// Errors decoding a stored backend into its typed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value of the wrong type or range.
    #[error("Backend '{name}': field '{key}' must be {expected}, found {found}")]
    InvalidField {
        name: String,
        key: String,
        expected: &'static str,
        found: String,
    },

    /// A Drime backend without an API key.
    #[error(
        "Drime backend '{name}' requires api_key in config.\n\n\
         Reconfigure with: oxdav config add {name} --type drime"
    )]
    MissingApiKey { name: String },

    /// The stored type tag names no backend known to this build.
    #[error(
        "Backend '{name}' has unknown type '{tag}'.\n\n\
         Known types: {known}\n\
         Reconfigure with: oxdav config add {name} --type <TYPE>"
    )]
    UnknownStoredType {
        name: String,
        tag: String,
        known: String,
    },
}

/// Configuration for the local filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// Directory served as the WebDAV root
    pub path: PathBuf,
    /// Reject all write methods
    pub readonly: bool,
}

impl LocalConfig {
    /// Decode from a stored record. A missing `path` falls back to [`DEFAULT_PATH`].
    pub fn from_record(record: &BackendRecord) -> Result<Self, ConfigError> {
        let fields = FieldReader::new(record);
        Ok(Self {
            path: fields
                .string("path")?
                .map_or_else(|| PathBuf::from(DEFAULT_PATH), PathBuf::from),
            readonly: fields.bool("readonly")?.unwrap_or(false),
        })
    }
}

/// Configuration for the Drime Cloud backend.
#[derive(Debug)]
pub struct DrimeConfig {
    /// API key used to authenticate against Drime
    pub api_key: SecretString,
    /// Workspace to serve (0 = personal)
    pub workspace_id: u64,
    /// Reject all write methods
    pub readonly: bool,
    /// How long remote metadata may be cached
    pub cache_ttl: Duration,
    /// Largest file accepted for upload, in bytes
    pub max_file_size: u64,
}

impl DrimeConfig {
    /// Decode from a stored record. `api_key` is required and must be non-empty.
    pub fn from_record(record: &BackendRecord) -> Result<Self, ConfigError> {
        let fields = FieldReader::new(record);

        let api_key = fields
            .string("api_key")?
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                name: record.name().to_string(),
            })?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            workspace_id: fields.u64("workspace_id")?.unwrap_or(DEFAULT_WORKSPACE_ID),
            readonly: fields.bool("readonly")?.unwrap_or(false),
            cache_ttl: fields.seconds("cache_ttl")?.unwrap_or(DEFAULT_CACHE_TTL),
            max_file_size: fields.u64("max_file_size")?.unwrap_or(DEFAULT_MAX_FILE_SIZE),
        })
    }
}

impl Clone for DrimeConfig {
    fn clone(&self) -> Self {
        Self {
            api_key: SecretString::from(self.api_key.expose_secret().to_string()),
            workspace_id: self.workspace_id,
            readonly: self.readonly,
            cache_ttl: self.cache_ttl,
            max_file_size: self.max_file_size,
        }
    }
}

/// Typed configuration for any backend.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    Local(LocalConfig),
    Drime(DrimeConfig),
}

impl BackendConfig {
    /// Parse a stored record's type tag without decoding its fields.
    pub fn stored_type(record: &BackendRecord) -> Result<BackendType, ConfigError> {
        record
            .backend_type()
            .ok_or_else(|| ConfigError::UnknownStoredType {
                name: record.name().to_string(),
                tag: record.type_tag().to_string(),
                known: BackendType::known_tags(),
            })
    }

    /// Decode a stored record, dispatching on its type tag.
    pub fn from_record(record: &BackendRecord) -> Result<Self, ConfigError> {
        match Self::stored_type(record)? {
            BackendType::Local => LocalConfig::from_record(record).map(BackendConfig::Local),
            BackendType::Drime => DrimeConfig::from_record(record).map(BackendConfig::Drime),
        }
    }

    pub fn backend_type(&self) -> BackendType {
        match self {
            BackendConfig::Local(_) => BackendType::Local,
            BackendConfig::Drime(_) => BackendType::Drime,
        }
    }

    pub fn readonly(&self) -> bool {
        match self {
            BackendConfig::Local(c) => c.readonly,
            BackendConfig::Drime(c) => c.readonly,
        }
    }

    /// Where the backend's data lives, for labels and banners
    pub fn location(&self) -> String {
        match self {
            BackendConfig::Local(c) => c.path.display().to_string(),
            BackendConfig::Drime(c) => format!("workspace {}", c.workspace_id),
        }
    }
}

/// Typed accessors over a record's revealed fields.
struct FieldReader<'a> {
    record: &'a BackendRecord,
}

impl<'a> FieldReader<'a> {
    fn new(record: &'a BackendRecord) -> Self {
        Self { record }
    }

    fn invalid(&self, key: &str, expected: &'static str, found: &FieldValue) -> ConfigError {
        ConfigError::InvalidField {
            name: self.record.name().to_string(),
            key: key.to_string(),
            expected,
            found: found.type_name().to_string(),
        }
    }

    fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.record.get(key) {
            None => Ok(None),
            Some(FieldValue::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.invalid(key, "a string", &other)),
        }
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.record.get(key) {
            None => Ok(None),
            Some(FieldValue::Bool(b)) => Ok(Some(b)),
            Some(other) => Err(self.invalid(key, "a boolean", &other)),
        }
    }

    fn u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.record.get(key) {
            None => Ok(None),
            Some(FieldValue::Integer(i)) => u64::try_from(i).map(Some).map_err(|_| {
                ConfigError::InvalidField {
                    name: self.record.name().to_string(),
                    key: key.to_string(),
                    expected: "a non-negative integer",
                    found: i.to_string(),
                }
            }),
            Some(other) => Err(self.invalid(key, "a non-negative integer", &other)),
        }
    }

    fn seconds(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        match self.record.get(key) {
            None => Ok(None),
            Some(value) => {
                let secs = value
                    .as_f64()
                    .ok_or_else(|| self.invalid(key, "a number of seconds", &value))?;
                Duration::try_from_secs_f64(secs)
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidField {
                        name: self.record.name().to_string(),
                        key: key.to_string(),
                        expected: "a non-negative number of seconds",
                        found: secs.to_string(),
                    })
            }
        }
    }
}
