//! vpoold — the vpool daemon.
//!
//! Loads a pool configuration and either runs one scheduling pass over every
//! VPod, or keeps the scheduler and autoscaler running against the
//! simulated pool until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! vpoold schedule --config config/vpool.toml
//! vpoold run --config config/vpool.toml --log-format json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vpool_plugins::PluginRegistry;
use vpoold::{Config, Daemon};

#[derive(Parser)]
#[command(name = "vpoold", about = "Virtual-replica pool scheduler and autoscaler")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Place every configured VPod once and print the placements as JSON.
    Schedule {
        /// Path to the pool configuration.
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Run the scheduler and autoscaler against the simulated pool until Ctrl-C.
    Run {
        /// Path to the pool configuration.
        #[arg(long, short)]
        config: PathBuf,
    },
    /// List the built-in filter and score plugins.
    Plugins,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Schedule { config } => schedule(config).await,
        Command::Run { config } => run(config).await,
        Command::Plugins => {
            let registry = PluginRegistry::with_defaults();
            println!("filters:");
            for name in registry.filter_names() {
                println!("  {name}");
            }
            println!("scores:");
            for name in registry.score_names() {
                println!("  {name}");
            }
            Ok(())
        }
    }
}

/// Logs go to stderr so `schedule` output stays machine-readable.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vpoold=debug,vpool=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load(path: PathBuf) -> anyhow::Result<Daemon> {
    let registry = PluginRegistry::with_defaults();
    let config = Config::from_file(&path, &registry)?;
    info!(path = %path.display(), pool = %config.pool.name, "configuration loaded");
    Daemon::new(&config, registry)
}

async fn schedule(path: PathBuf) -> anyhow::Result<()> {
    let daemon = load(path)?;
    let reports = daemon.schedule_all().await?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn run(path: PathBuf) -> anyhow::Result<()> {
    let mut daemon = load(path)?;

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    info!("vpoold running");
    daemon.run(shutdown_rx).await;
    info!("vpoold stopped");
    Ok(())
}
