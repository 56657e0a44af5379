//! # Duebell — push reminders for due tasks
//!
//! Usage:
//!   duebell run                          # One invocation, for cron-style hosts
//!   duebell run --dry-run --json         # Resolve and report, send nothing
//!   duebell watch --interval 300         # In-process loop
//!   duebell check-config                 # Validate configuration and exit
//!
//! Exit codes: 0 ok (per-send failures included), 2 incomplete
//! configuration, 3 store unavailable, 1 anything else.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use duebell_core::{DispatchConfig, DuebellConfig, DuebellError, TaskStore};
use duebell_push::WebPushTransport;
use duebell_scheduler::{DispatchEngine, spawn_scheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duebell", version, about = "🔔 Duebell — push reminders for due tasks")]
struct Cli {
    /// Dispatch config file (default: ~/.duebell/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Notify every due task once, then exit
    Run {
        /// Evaluate due dates at this instant instead of now (RFC 3339)
        #[arg(long, value_parser = parse_instant)]
        now: Option<DateTime<Utc>>,

        /// Resolve subscriptions and build payloads without sending
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run on a fixed interval until interrupted
    Watch {
        /// Seconds between runs
        #[arg(short, long, default_value = "300")]
        interval: u64,
    },
    /// Load and validate configuration, then exit
    CheckConfig,
}

fn parse_instant(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

const LOG_TARGETS: [&str; 5] = [
    "duebell",
    "duebell_scheduler",
    "duebell_store",
    "duebell_push",
    "duebell_client",
];

/// Filter used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn init_logging(verbose: bool, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&str>) -> Result<DuebellConfig> {
    let dispatch = match path {
        Some(p) => DispatchConfig::load_from(&PathBuf::from(shellexpand::tilde(p).to_string()))?,
        None => DispatchConfig::load()?,
    };
    Ok(DuebellConfig::from_env(dispatch)?)
}

fn build_engine(config: &DuebellConfig) -> Result<DispatchEngine> {
    let store: Arc<dyn TaskStore> = Arc::from(duebell_store::open_store(config)?);
    let transport = Arc::new(WebPushTransport::new(&config.vapid, config.dispatch.ttl_secs)?);
    Ok(DispatchEngine::new(store, transport, &config.dispatch))
}

async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::CheckConfig => {
            println!("✅ Configuration OK");
            println!("   Store:    {}", config.store);
            println!("   Policy:   {:?}", config.dispatch.policy);
            println!("   Tag:      {:?}", config.dispatch.tag_mode);
            println!("   Subject:  {}", config.vapid.subject);
        }
        Command::Run { now, dry_run, json } => {
            let engine = build_engine(&config)?.with_dry_run(dry_run);
            let summary = engine.run(now.unwrap_or_else(Utc::now)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Command::Watch { interval } => {
            let engine = Arc::new(build_engine(&config)?);
            tracing::info!("🔔 Duebell watching {} every {}s", config.store, interval);
            tokio::select! {
                _ = spawn_scheduler(engine, interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("👋 Interrupted, shutting down");
                }
            }
        }
    }
    Ok(())
}

/// Process exit code for a failed invocation.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DuebellError>().map_or(1, DuebellError::exit_code)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    if let Err(e) = execute(cli).await {
        tracing::error!("❌ {e:#}");
        std::process::exit(exit_code(&e));
    }
}
