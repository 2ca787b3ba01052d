//! Config command - manage named backends in the backend store.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args as ClapArgs, Subcommand};
use comfy_table::Cell;
use oxdav_core::backend::is_sensitive;
use oxdav_core::dispatch::DRIME_API_KEY_ENV;
use oxdav_core::{BackendConfig, BackendRecord, BackendStore, BackendType, FieldValue, Fields};
use tracing::debug;

use crate::auth::{prompt_secret, read_secret_from_stdin};
use crate::output::{MASK, create_table, format_mode, format_size};

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Add a named backend, replacing any existing one with the same name
    #[command(after_help = "Secrets such as the Drime API key are obscured in the store, \
                            not encrypted. Anyone who can read the store file can recover them.")]
    Add(AddArgs),

    /// List configured backends
    List(ListArgs),

    /// Show one backend's fields
    Show(ShowArgs),

    /// Remove a named backend
    Remove(RemoveArgs),

    /// Print the path of the backend store file
    Path,
}

#[derive(ClapArgs, Clone, Debug)]
pub struct AddArgs {
    /// Name used with `oxdav --backend <NAME>`
    pub name: String,

    /// Backend type (local, drime)
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub backend_type: BackendType,

    /// Directory to serve (local only, required)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Serve the backend read-only
    #[arg(long)]
    pub readonly: bool,

    /// Workspace to serve, 0 for personal (drime only)
    #[arg(long)]
    pub workspace_id: Option<u64>,

    /// Seconds remote metadata may be cached (drime only)
    #[arg(long, value_name = "SECONDS")]
    pub cache_ttl: Option<f64>,

    /// Largest accepted upload in bytes (drime only)
    #[arg(long, value_name = "BYTES")]
    pub max_file_size: Option<u64>,

    /// Read the Drime API key from stdin instead of DRIME_API_KEY or a prompt
    #[arg(long)]
    pub api_key_stdin: bool,
}

#[derive(ClapArgs, Clone, Debug)]
pub struct ListArgs {
    /// Only list backends of this type
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub backend_type: Option<BackendType>,

    /// Output in JSON format (secrets masked)
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Clone, Debug)]
pub struct ShowArgs {
    pub name: String,

    /// Print secrets in plain text
    #[arg(long)]
    pub reveal: bool,
}

#[derive(ClapArgs, Clone, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

pub fn execute(command: Command) -> Result<()> {
    let store = BackendStore::open_default()?;
    debug!(path = %store.path().display(), "Using backend store");

    match command {
        Command::Add(args) => add(&store, args),
        Command::List(args) => list(&store, &args),
        Command::Show(args) => show(&store, &args),
        Command::Remove(args) => remove(&store, &args),
        Command::Path => {
            println!("{}", store.path().display());
            Ok(())
        }
    }
}

fn add(store: &BackendStore, args: AddArgs) -> Result<()> {
    let fields = match args.backend_type {
        BackendType::Local => local_fields(&args)?,
        BackendType::Drime => drime_fields(&args)?,
    };

    let existed = store.has(&args.name)?;
    store.add_or_update(&args.name, args.backend_type, fields, true)?;

    let verb = if existed { "Updated" } else { "Added" };
    println!(
        "{verb} backend '{}' (type: {})",
        args.name, args.backend_type
    );
    println!("Serve it with: oxdav --backend {}", args.name);
    Ok(())
}

fn local_fields(args: &AddArgs) -> Result<Fields> {
    reject_flags(
        args,
        &[
            ("--workspace-id", args.workspace_id.is_some()),
            ("--cache-ttl", args.cache_ttl.is_some()),
            ("--max-file-size", args.max_file_size.is_some()),
            ("--api-key-stdin", args.api_key_stdin),
        ],
    )?;

    let Some(path) = &args.path else {
        bail!("--path is required for local backends");
    };
    let path = std::path::absolute(path)
        .with_context(|| format!("Invalid path: {}", path.display()))?;
    let path = path
        .to_str()
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?
        .to_string();

    let mut fields = Fields::new();
    fields.insert("path".into(), FieldValue::String(path));
    fields.insert("readonly".into(), FieldValue::Bool(args.readonly));
    Ok(fields)
}

fn drime_fields(args: &AddArgs) -> Result<Fields> {
    reject_flags(args, &[("--path", args.path.is_some())])?;

    let api_key = if args.api_key_stdin {
        read_secret_from_stdin("--api-key-stdin")?
    } else {
        match std::env::var(DRIME_API_KEY_ENV) {
            Ok(key) if !key.is_empty() => key,
            _ => prompt_secret("Drime API key")?,
        }
    };

    let mut fields = Fields::new();
    fields.insert("api_key".into(), FieldValue::String(api_key));
    fields.insert("readonly".into(), FieldValue::Bool(args.readonly));

    insert_drime_settings(&mut fields, args)?;
    Ok(fields)
}

fn insert_drime_settings(fields: &mut Fields, args: &AddArgs) -> Result<()> {
    if let Some(workspace_id) = args.workspace_id {
        let workspace_id = i64::try_from(workspace_id).context("--workspace-id is too large")?;
        fields.insert("workspace_id".into(), FieldValue::Integer(workspace_id));
    }
    if let Some(cache_ttl) = args.cache_ttl {
        if !cache_ttl.is_finite() || cache_ttl < 0.0 {
            bail!("--cache-ttl must be a non-negative number of seconds");
        }
        fields.insert("cache_ttl".into(), FieldValue::Float(cache_ttl));
    }
    if let Some(max_file_size) = args.max_file_size {
        let bytes = i64::try_from(max_file_size).context("--max-file-size is too large")?;
        fields.insert("max_file_size".into(), FieldValue::Integer(bytes));
    }
    Ok(())
}

fn reject_flags(args: &AddArgs, flags: &[(&str, bool)]) -> Result<()> {
    let given: Vec<&str> = flags
        .iter()
        .filter(|(_, set)| *set)
        .map(|(flag, _)| *flag)
        .collect();
    if !given.is_empty() {
        bail!(
            "{} cannot be used with {} backends",
            given.join(", "),
            args.backend_type
        );
    }
    Ok(())
}

fn list(store: &BackendStore, args: &ListArgs) -> Result<()> {
    let records: Vec<BackendRecord> = store
        .records()?
        .into_iter()
        .filter(|r| args.backend_type.is_none_or(|t| r.backend_type() == Some(t)))
        .collect();

    if args.json {
        let json: Vec<_> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name(),
                    "type": r.type_tag(),
                    "fields": masked_fields(r),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if records.is_empty() {
        eprintln!("No backends configured.");
        eprintln!("Add one with: oxdav config add <NAME> --type <TYPE>");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Name", "Type", "Location", "Mode"]);
    for record in &records {
        let (location, mode) = match BackendConfig::from_record(record) {
            Ok(config) => (config.location(), format_mode(config.readonly()).to_string()),
            Err(e) => {
                debug!(backend = %record.name(), error = %e, "Backend does not decode");
                ("(invalid)".to_string(), "-".to_string())
            }
        };
        table.add_row(vec![
            Cell::new(record.name()),
            Cell::new(record.type_tag()),
            Cell::new(location),
            Cell::new(mode),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn show(store: &BackendStore, args: &ShowArgs) -> Result<()> {
    let Some(record) = store.get(&args.name)? else {
        bail!("Backend '{}' not found", args.name);
    };

    let fields = if args.reveal {
        record.get_all()
    } else {
        masked_fields(&record)
    };

    println!("Name: {}", record.name());
    println!("Type: {}", record.type_tag());
    for (key, value) in &fields {
        match (key.as_str(), value) {
            ("max_file_size", FieldValue::Integer(bytes)) if *bytes >= 0 => {
                println!("{key}: {value} ({})", format_size(bytes.unsigned_abs()));
            }
            _ => println!("{key}: {value}"),
        }
    }
    Ok(())
}

fn remove(store: &BackendStore, args: &RemoveArgs) -> Result<()> {
    if !store.remove(&args.name)? {
        bail!("Backend '{}' not found", args.name);
    }
    println!("Removed backend '{}'", args.name);
    Ok(())
}

fn masked_fields(record: &BackendRecord) -> Fields {
    record
        .raw_fields()
        .iter()
        .map(|(key, value)| {
            let shown = if is_sensitive(key) {
                FieldValue::String(MASK.to_string())
            } else {
                value.clone()
            };
            (key.clone(), shown)
        })
        .collect()
}
