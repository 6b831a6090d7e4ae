//! Command-line front end for a persisted timeout queue.
//!
//! Payloads are arbitrary JSON values. Tracing output goes to stderr so
//! stdout carries only command results.

use clap::{Parser, Subcommand};
use persist_timeout::identity::{self, InstanceCounter};
use persist_timeout::store::Store;
use persist_timeout::{Listener, Persister, PersisterConfig};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Schedule, inspect, and fire persisted timeouts.
#[derive(Parser)]
#[command(name = "persist-timeout", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instance name (overrides the config file).
    #[arg(short, long)]
    name: Option<String>,

    /// Directory holding state files (overrides the config file).
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Persist a timeout firing after the given delay.
    Schedule {
        /// Delay before firing, in milliseconds.
        #[arg(short, long)]
        delay_ms: u64,
        /// JSON payload.
        data: String,
    },

    /// Print pending timeouts as JSON.
    List,

    /// Run the scheduler and print each fired timeout until Ctrl+C.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("persist_timeout=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.config {
        PersisterConfig::from_file(path)?
    } else {
        PersisterConfig::default()
    };
    if cli.name.is_some() {
        config.name = cli.name;
    }
    if cli.dir.is_some() {
        config.base_dir = cli.dir;
    }

    match cli.command {
        Command::Schedule { delay_ms, data } => schedule(config, delay_ms, &data).await,
        Command::List => list(&config),
        Command::Watch => watch(config).await,
    }
}

async fn schedule(config: PersisterConfig, delay_ms: u64, data: &str) -> anyhow::Result<()> {
    let payload: Value = serde_json::from_str(data)?;
    let persister: Persister<Value> = Persister::start(config, &InstanceCounter::new())?;

    let id = persister
        .set_timeout(payload, Duration::from_millis(delay_ms))
        .await?;
    persister.stop();

    println!("{id}");
    Ok(())
}

fn list(config: &PersisterConfig) -> anyhow::Result<()> {
    config.validate()?;
    let process_id = identity::process_id(config.app_name.as_deref());
    let instance_id =
        identity::instance_id(&process_id, config.name.as_deref(), &InstanceCounter::new());
    let store = Store::for_instance(&config.resolved_base_dir(), &instance_id);

    let pending = store.load::<Value>()?;
    println!("{}", serde_json::to_string_pretty(&pending)?);
    Ok(())
}

async fn watch(config: PersisterConfig) -> anyhow::Result<()> {
    let persister: Persister<Value> = Persister::start(config, &InstanceCounter::new())?;
    persister.add_listener(Listener::from_fn(|data: Value, meta| {
        let line = serde_json::json!({ "timeout_id": meta.timeout_id, "data": data });
        println!("{line}");
    }));

    info!(
        "watching {} ({} pending)",
        persister.path().display(),
        persister.pending().len()
    );
    tokio::signal::ctrl_c().await?;
    info!("received Ctrl+C, shutting down...");
    persister.stop();
    Ok(())
}
