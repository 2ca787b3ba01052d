//! Serve command - resolve a backend and run the WebDAV server.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use oxdav_core::config::{
    DEFAULT_CACHE_TTL, DEFAULT_HOST, DEFAULT_MAX_FILE_SIZE, DEFAULT_PATH, DEFAULT_PORT,
    DEFAULT_WORKSPACE_ID,
};
use oxdav_core::dispatch::{
    AuthRequest, ConnectionOverrides, DEFAULT_BACKEND, Environment, LegacyOptions,
    ResolutionRequest,
};
use oxdav_core::{BackendStore, Dispatcher, ProviderRegistry, ResolvedProvider};
use oxdav_webdav::{ServerConfig, WebDavServer};
use secrecy::SecretString;
use tracing::instrument;

use crate::output::format_mode;

#[derive(ClapArgs, Clone, Debug)]
pub struct Args {
    /// Named backend from `oxdav config`, or a backend type (local, drime)
    #[arg(short, long, default_value = DEFAULT_BACKEND, env = "OXDAV_BACKEND")]
    pub backend: String,

    /// Directory to serve (local type only)
    #[arg(long, default_value = DEFAULT_PATH)]
    pub path: PathBuf,

    /// Host to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// WebDAV username (requires --password)
    #[arg(short, long)]
    pub username: Option<String>,

    /// WebDAV password (requires --username)
    #[arg(long, env = "OXDAV_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Disable authentication, even if credentials are given
    #[arg(long)]
    pub no_auth: bool,

    /// Reject all write methods (backend types only; named backends store this)
    #[arg(long)]
    pub readonly: bool,

    /// Seconds remote metadata may be cached (drime type only)
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_CACHE_TTL.as_secs_f64())]
    pub cache_ttl: f64,

    /// Largest accepted upload in bytes (drime type only)
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Workspace to serve, 0 for personal (drime type only)
    #[arg(long, default_value_t = DEFAULT_WORKSPACE_ID)]
    pub workspace_id: u64,

    /// PEM certificate chain for HTTPS (requires --ssl-key)
    #[arg(long, value_name = "FILE")]
    pub ssl_cert: Option<PathBuf>,

    /// PEM private key for HTTPS (requires --ssl-cert)
    #[arg(long, value_name = "FILE")]
    pub ssl_key: Option<PathBuf>,
}

impl Args {
    fn into_request(self) -> Result<ResolutionRequest> {
        let cache_ttl = Duration::try_from_secs_f64(self.cache_ttl)
            .with_context(|| format!("Invalid --cache-ttl: {}", self.cache_ttl))?;

        Ok(ResolutionRequest {
            identifier: self.backend,
            connection: ConnectionOverrides {
                host: self.host,
                port: self.port,
                ssl_cert: self.ssl_cert,
                ssl_key: self.ssl_key,
            },
            auth: AuthRequest {
                username: self.username,
                password: self.password.map(SecretString::from),
                no_auth: self.no_auth,
            },
            legacy: LegacyOptions {
                path: self.path,
                readonly: self.readonly,
                cache_ttl,
                max_file_size: self.max_file_size,
                workspace_id: self.workspace_id,
            },
            env: Environment::from_process(),
        })
    }
}

#[instrument(skip_all, fields(backend = %args.backend))]
pub fn execute(args: Args) -> Result<()> {
    let store = BackendStore::open_default()?;
    let registry = ProviderRegistry::with_builtin();

    let request = args.into_request()?;
    let resolved = Dispatcher::new(&store, &registry).resolve(request)?;

    if let Some(warning) = &resolved.credential_warning {
        eprintln!("Warning: {warning}");
    }
    print_banner(&resolved);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(resolved))
}

async fn serve(resolved: ResolvedProvider) -> Result<()> {
    let ResolvedProvider {
        provider,
        label,
        connection,
        auth,
        ..
    } = resolved;

    let config = ServerConfig {
        host: connection.host,
        port: connection.port,
        auth,
        tls: connection.tls,
        label,
    };
    let server = WebDavServer::start(provider.as_ref(), config)
        .await
        .context("Failed to start WebDAV server")?;

    println!("Serving at {}", server.url());
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    eprintln!("\nShutting down...");
    server.stop().await;
    Ok(())
}

fn print_banner(resolved: &ResolvedProvider) {
    println!("{}", resolved.label);
    println!(
        "  Backend: {} (type: {})",
        resolved.backend_name, resolved.backend_type
    );
    println!("  Location: {}", resolved.provider.location());
    println!("  Address: {}", resolved.connection.url());
    println!("  Mode: {}", format_mode(resolved.readonly()));
    println!("  Auth: {}", resolved.auth.describe());
    match &resolved.connection.tls {
        Some(tls) => println!("  SSL: Enabled ({})", tls.cert_path.display()),
        None => println!("  SSL: Disabled"),
    }
}
