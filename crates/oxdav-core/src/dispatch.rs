//! Resolution of a backend identifier into a ready-to-serve provider.
//!
//! An identifier is first looked up as the name of a stored backend. If no
//! backend has that name, it is treated as a raw backend type ("legacy"
//! mode), with options taken from the command line and credentials from the
//! environment.
//!
//! | Setting              | Named backend          | Legacy type               |
//! |----------------------|------------------------|---------------------------|
//! | Backend type         | stored `type`          | identifier                |
//! | Backend fields       | stored record          | command-line options      |
//! | Drime API key        | stored `api_key`       | `DRIME_API_KEY`           |
//! | Host, port, TLS      | command line           | command line              |
//! | WebDAV username/pass | command line           | command line              |
//!
//! Every failure here is fatal: the server never starts on a partially
//! resolved configuration, and nothing is retried.

use std::collections::BTreeMap;
use std::env::VarError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::BackendType;
use crate::config::{
    BackendConfig, ConfigError, DEFAULT_CACHE_TTL, DEFAULT_HOST, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_PATH, DEFAULT_PORT, DEFAULT_WORKSPACE_ID, DrimeConfig, LocalConfig,
};
use crate::provider::{ProviderConstructor, ProviderError, ProviderRegistry, StorageProvider};
use crate::store::{BackendStore, StoreError};

/// Environment variable holding the Drime API key in legacy mode
pub const DRIME_API_KEY_ENV: &str = "DRIME_API_KEY";

/// Identifier used when none is given
pub const DEFAULT_BACKEND: &str = "local";

/// Snapshot of the environment variables resolution may read.
#[derive(Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the variables of the current process that resolution reads.
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Result<String, VarError>) -> Self {
        let mut env = Self::default();
        match lookup(DRIME_API_KEY_ENV) {
            Ok(value) => {
                env.vars.insert(DRIME_API_KEY_ENV.to_string(), value);
            }
            Err(VarError::NotUnicode(_)) => {
                warn!("{DRIME_API_KEY_ENV} is set but is not valid UTF-8; ignoring it");
            }
            Err(VarError::NotPresent) => {}
        }
        env
    }

    /// Set a variable, for tests and embedding.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Get a variable; empty values count as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are credentials; only show which variables are set
        f.debug_struct("Environment")
            .field("vars", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Connection settings from the command line. These always win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOverrides {
    pub host: String,
    pub port: u16,
    pub ssl_cert: Option<PathBuf>,
    pub ssl_key: Option<PathBuf>,
}

impl Default for ConnectionOverrides {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            ssl_cert: None,
            ssl_key: None,
        }
    }
}

/// WebDAV client credentials requested on the command line.
#[derive(Debug, Default)]
pub struct AuthRequest {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Disable authentication even if credentials are given
    pub no_auth: bool,
}

/// Per-type options for legacy mode. Ignored for named backends.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyOptions {
    pub path: PathBuf,
    pub readonly: bool,
    pub cache_ttl: Duration,
    pub max_file_size: u64,
    pub workspace_id: u64,
}

impl Default for LegacyOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_PATH),
            readonly: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            workspace_id: DEFAULT_WORKSPACE_ID,
        }
    }
}

/// Everything one resolution needs. Built fresh per invocation.
#[derive(Debug, Default)]
pub struct ResolutionRequest {
    /// Stored backend name or backend type
    pub identifier: String,
    pub connection: ConnectionOverrides,
    pub auth: AuthRequest,
    pub legacy: LegacyOptions,
    pub env: Environment,
}

impl ResolutionRequest {
    /// A request with defaults for everything but the identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }
}

/// Effective WebDAV authentication.
#[derive(Debug)]
pub enum WebDavAuth {
    Anonymous,
    Basic {
        username: String,
        password: SecretString,
    },
}

impl WebDavAuth {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, WebDavAuth::Anonymous)
    }

    /// Short description for the startup banner
    pub fn describe(&self) -> String {
        match self {
            WebDavAuth::Anonymous => "Disabled (anonymous access)".to_string(),
            WebDavAuth::Basic { username, .. } => format!("Enabled (user: {username})"),
        }
    }
}

/// Credentials that were given only in part, and so were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialWarning {
    UsernameWithoutPassword,
    PasswordWithoutUsername,
}

impl fmt::Display for CredentialWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialWarning::UsernameWithoutPassword => {
                f.write_str("Username provided but no password. Using anonymous access.")
            }
            CredentialWarning::PasswordWithoutUsername => {
                f.write_str("Password provided but no username. Using anonymous access.")
            }
        }
    }
}

/// Decide the effective WebDAV authentication.
///
/// `no_auth` always wins. A lone username or password is downgraded to
/// anonymous access with a warning rather than rejected.
pub fn resolve_auth(request: AuthRequest) -> (WebDavAuth, Option<CredentialWarning>) {
    if request.no_auth {
        return (WebDavAuth::Anonymous, None);
    }

    let username = request.username.filter(|u| !u.is_empty());
    let password = request.password.filter(|p| !p.expose_secret().is_empty());
    match (username, password) {
        (Some(username), Some(password)) => (WebDavAuth::Basic { username, password }, None),
        (Some(_), None) => (
            WebDavAuth::Anonymous,
            Some(CredentialWarning::UsernameWithoutPassword),
        ),
        (None, Some(_)) => (
            WebDavAuth::Anonymous,
            Some(CredentialWarning::PasswordWithoutUsername),
        ),
        (None, None) => (WebDavAuth::Anonymous, None),
    }
}

/// PEM certificate chain and private key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Effective listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsMaterial>,
}

impl ConnectionParams {
    /// `host:port`, with IPv6 hosts bracketed
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Base URL clients connect to
    pub fn url(&self) -> String {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        format!("{scheme}://{}", self.address())
    }
}

/// Which path produced the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    NamedConfig,
    LegacyType,
}

/// A provider ready to be served, with everything the server needs.
#[derive(Debug)]
pub struct ResolvedProvider {
    pub provider: Box<dyn StorageProvider>,
    /// Display label, e.g. `oxdav (photos: /srv/photos)`
    pub label: String,
    /// Stored name, or the type tag in legacy mode
    pub backend_name: String,
    pub backend_type: BackendType,
    pub source: ResolutionSource,
    pub connection: ConnectionParams,
    pub auth: WebDavAuth,
    pub credential_warning: Option<CredentialWarning>,
}

impl ResolvedProvider {
    pub fn readonly(&self) -> bool {
        self.provider.is_readonly()
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Legacy drime mode without an API key in the environment.
    #[error(
        "Drime backend requires DRIME_API_KEY environment variable.\n\n\
         Either:\n  \
         export DRIME_API_KEY='your-api-key'\n\
         or create a named backend:\n  \
         oxdav config add <name> --type drime"
    )]
    MissingEnvCredential,

    /// The identifier is neither a stored name nor a backend type.
    #[error(
        "Unknown backend '{requested}'.\n\nAvailable backends: {}",
        available_backends(.configured)
    )]
    UnknownBackend {
        requested: String,
        configured: Vec<String>,
    },

    /// Only one of certificate and key was given.
    #[error("Both --ssl-cert and --ssl-key are required for HTTPS (only {given} was given)")]
    IncompleteTls { given: &'static str },

    /// No constructor is registered for the type.
    #[error(
        "The {} backend requires extra installation and is not available in this build",
        .backend_type.display_name()
    )]
    ProviderUnavailable { backend_type: BackendType },

    /// The provider's constructor failed.
    #[error("Failed to initialize {} backend: {source}", .backend_type.display_name())]
    ProviderConstruction {
        backend_type: BackendType,
        #[source]
        source: ProviderError,
    },
}

fn available_backends(configured: &[String]) -> String {
    let mut list = BackendType::known_tags();
    if !configured.is_empty() {
        list.push_str("\nConfigured backends: ");
        list.push_str(&configured.join(", "));
    }
    list
}

/// Resolves requests against a store and a provider registry.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    store: &'a BackendStore,
    registry: &'a ProviderRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(store: &'a BackendStore, registry: &'a ProviderRegistry) -> Self {
        Self { store, registry }
    }

    /// Resolve a request into a provider.
    pub fn resolve(&self, request: ResolutionRequest) -> Result<ResolvedProvider, DispatchError> {
        let ResolutionRequest {
            identifier,
            connection,
            auth,
            legacy,
            env,
        } = request;

        let connection = resolve_connection(connection)?;

        let (auth, credential_warning) = resolve_auth(auth);
        if let Some(warning) = credential_warning {
            warn!("{warning}");
        }

        // Availability is checked before any field or credential
        let (config, construct, backend_name, source) = match self.store.get(&identifier)? {
            Some(record) => {
                if legacy.readonly {
                    warn!(
                        backend = %identifier,
                        "--readonly is ignored for named backends; set it with `oxdav config add`"
                    );
                }
                debug!(
                    backend = %identifier,
                    backend_type = record.type_tag(),
                    "Using named backend"
                );
                let construct = self.constructor(BackendConfig::stored_type(&record)?)?;
                let config = BackendConfig::from_record(&record)?;
                (config, construct, identifier, ResolutionSource::NamedConfig)
            }
            None => {
                let Ok(backend_type) = identifier.parse::<BackendType>() else {
                    return Err(DispatchError::UnknownBackend {
                        requested: identifier,
                        configured: self.store.list_names()?,
                    });
                };
                debug!(backend_type = %backend_type, "Using legacy backend type");
                let construct = self.constructor(backend_type)?;
                let config = legacy_config(backend_type, legacy, &env)?;
                let name = backend_type.as_str().to_string();
                (config, construct, name, ResolutionSource::LegacyType)
            }
        };

        let backend_type = config.backend_type();
        let provider = construct(&config).map_err(|source| {
            error!(
                backend = %backend_name,
                backend_type = %backend_type,
                error = ?source,
                "Provider construction failed"
            );
            DispatchError::ProviderConstruction {
                backend_type,
                source,
            }
        })?;

        let label = match source {
            ResolutionSource::NamedConfig => {
                format!("oxdav ({backend_name}: {})", config.location())
            }
            ResolutionSource::LegacyType => {
                format!("oxdav ({}: {})", backend_type.display_name(), config.location())
            }
        };

        info!(
            backend = %backend_name,
            backend_type = %backend_type,
            readonly = provider.is_readonly(),
            "Resolved backend"
        );

        Ok(ResolvedProvider {
            provider,
            label,
            backend_name,
            backend_type,
            source,
            connection,
            auth,
            credential_warning,
        })
    }

    fn constructor(&self, backend_type: BackendType) -> Result<ProviderConstructor, DispatchError> {
        self.registry
            .get(backend_type)
            .ok_or(DispatchError::ProviderUnavailable { backend_type })
    }
}

/// Build a legacy-mode config from command-line options and the environment.
fn legacy_config(
    backend_type: BackendType,
    legacy: LegacyOptions,
    env: &Environment,
) -> Result<BackendConfig, DispatchError> {
    Ok(match backend_type {
        BackendType::Local => BackendConfig::Local(LocalConfig {
            path: legacy.path,
            readonly: legacy.readonly,
        }),
        BackendType::Drime => {
            let api_key = env
                .get(DRIME_API_KEY_ENV)
                .ok_or(DispatchError::MissingEnvCredential)?;
            BackendConfig::Drime(DrimeConfig {
                api_key: SecretString::from(api_key.to_string()),
                workspace_id: legacy.workspace_id,
                readonly: legacy.readonly,
                cache_ttl: legacy.cache_ttl,
                max_file_size: legacy.max_file_size,
            })
        }
    })
}

fn resolve_connection(overrides: ConnectionOverrides) -> Result<ConnectionParams, DispatchError> {
    let tls = match (overrides.ssl_cert, overrides.ssl_key) {
        (Some(cert_path), Some(key_path)) => Some(TlsMaterial {
            cert_path,
            key_path,
        }),
        (Some(_), None) => {
            return Err(DispatchError::IncompleteTls {
                given: "--ssl-cert",
            });
        }
        (None, Some(_)) => return Err(DispatchError::IncompleteTls { given: "--ssl-key" }),
        (None, None) => None,
    };

    Ok(ConnectionParams {
        host: overrides.host,
        port: overrides.port,
        tls,
    })
}
