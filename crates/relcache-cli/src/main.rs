//! relcache - inspect and edit a relational cache from the shell.
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relcache::{BackendRegistry, Cache, CacheValue, Key, StoreConfigFile, Value};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "relcache")]
#[command(about = "Scoped key-value cache over relational databases")]
struct Args {
    /// Enable debug logging (logs every SQL statement)
    #[arg(short, long)]
    debug: bool,

    /// JSON store configuration (options, scopes, single_table)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend URI, e.g. sqlite:///path/cache.db or memory://
    uri: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List scopes
    Scopes,
    /// List the keys of a scope
    Keys { scope: String },
    /// Print the value stored under a key, or null
    Get {
        scope: String,
        #[arg(required = true)]
        key: Vec<String>,
    },
    /// Store a value under a key
    Set {
        scope: String,
        #[arg(required = true)]
        key: Vec<String>,
        /// Value as JSON (object, array or scalar)
        #[arg(long)]
        value: String,
    },
    /// Delete a key
    Pop {
        scope: String,
        #[arg(required = true)]
        key: Vec<String>,
    },
    /// Print whether a key is present
    Exists {
        scope: String,
        #[arg(required = true)]
        key: Vec<String>,
    },
}

/// A key component: JSON scalar when it parses as one, text otherwise.
fn parse_component(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|json| Value::from_json(json).ok())
        .unwrap_or_else(|| Value::from(raw))
}

fn parse_key(parts: &[String]) -> Key {
    match parts {
        [single] => Key::from(parse_component(single)),
        _ => Key::from(parts.iter().map(|p| parse_component(p)).collect::<Vec<_>>()),
    }
}

fn run(cache: &mut dyn Cache, command: Command) -> Result<serde_json::Value> {
    let output = match command {
        Command::Scopes => {
            serde_json::Value::Array(cache.scopes()?.iter().map(Key::to_json).collect())
        }
        Command::Keys { scope } => {
            let scope = Key::from(parse_component(&scope));
            serde_json::Value::Array(cache.keys(Some(&scope))?.iter().map(Key::to_json).collect())
        }
        Command::Get { scope, key } => {
            let scope = Key::from(parse_component(&scope));
            cache
                .fetch(&parse_key(&key), Some(&scope))?
                .map_or(serde_json::Value::Null, |value| value.to_json())
        }
        Command::Set { scope, key, value } => {
            let scope = Key::from(parse_component(&scope));
            let json: serde_json::Value =
                serde_json::from_str(&value).context("--value is not valid JSON")?;
            let value = CacheValue::from_json(json)?;
            serde_json::Value::Bool(cache.set(&parse_key(&key), &value, Some(&scope))?)
        }
        Command::Pop { scope, key } => {
            let scope = Key::from(parse_component(&scope));
            cache.pop(&parse_key(&key), Some(&scope))?;
            serde_json::Value::Null
        }
        Command::Exists { scope, key } => {
            let scope = Key::from(parse_component(&scope));
            serde_json::Value::Bool(cache.exists(&parse_key(&key), Some(&scope))?)
        }
    };
    Ok(output)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --debug when set
    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = match &args.config {
        Some(path) => StoreConfigFile::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => StoreConfigFile::default(),
    };

    let registry = BackendRegistry::with_defaults();
    debug!("Available schemes: {:?}", registry.schemes());
    let mut cache = registry
        .open_with(&args.uri, &config)
        .with_context(|| format!("Failed to open {}", args.uri))?;

    let output = run(cache.as_mut(), args.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
