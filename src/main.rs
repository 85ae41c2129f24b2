// src/main.rs

//! mintwatch CLI
//!
//! Watches a token launchpad feed and relays launches from
//! high-reach creators to a Telegram channel.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;

use mintwatch::config::Config;
use mintwatch::enrich::FollowerStatsClient;
use mintwatch::error::Result;
use mintwatch::notify::{Backoff, Notifier, TelegramSink};
use mintwatch::pipeline::{FilterPolicy, Orchestrator, RetryQueue};
use mintwatch::scheduler;
use mintwatch::source::GraphqlSource;
use mintwatch::store::{LocalSnapshotStore, SnapshotStore};

/// mintwatch - token launch alert relay
#[derive(Parser, Debug)]
#[command(name = "mintwatch", version, about = "Token launch alert relay")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the polling daemon until interrupted
    Run,

    /// Run a single poll cycle and exit
    Once,

    /// Validate the configuration file
    Validate,

    /// Show persisted snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Wire the pipeline from configuration. Fails on invalid config or
/// missing credentials; everything past this point is non-fatal.
async fn build_orchestrator(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<Orchestrator> {
    config.validate()?;

    let source = GraphqlSource::new(&config.source, &config.http)?;
    let signals = FollowerStatsClient::new(&config.enrichment, &config.http)?;
    let sink = TelegramSink::new(&config.notifier)?;
    let backoff = Backoff::new(
        Duration::from_secs(config.notifier.backoff_floor_secs),
        Duration::from_secs(config.notifier.backoff_ceiling_secs),
    );

    let snapshots = LocalSnapshotStore::new(&config.store.snapshot_path);
    let dedup = snapshots.load(config.store.capacity).await;

    Ok(Orchestrator::new(
        Box::new(source),
        Box::new(signals),
        Notifier::new(Box::new(sink), backoff),
        FilterPolicy::new(&config.filter),
        dedup,
        Box::new(snapshots),
        RetryQueue::new(&config.retry),
        Duration::from_secs(config.source.recency_cutoff_secs),
        shutdown,
    ))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run => {
            log::info!("mintwatch starting...");

            let (tx, rx) = watch::channel(false);
            let orchestrator = build_orchestrator(&config, rx.clone()).await?;

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupt received, finishing in-flight delivery...");
                    let _ = tx.send(true);
                }
            });

            scheduler::run(
                orchestrator,
                Duration::from_secs(config.scheduler.interval_secs),
                rx,
            )
            .await?;

            log::info!("Stopped cleanly");
        }

        Command::Once => {
            let (_tx, rx) = watch::channel(false);
            let mut orchestrator = build_orchestrator(&config, rx).await?;

            let stats = orchestrator.run_cycle().await;
            orchestrator.persist().await;
            log::info!("Cycle complete: {stats:?}");
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let snapshots = LocalSnapshotStore::new(&config.store.snapshot_path);
            log::info!("Snapshot: {}", snapshots.path().display());

            let store = snapshots.load(config.store.capacity).await;
            log::info!(
                "Handled ids: {} (capacity {})",
                store.len(),
                store.capacity()
            );
        }
    }

    Ok(())
}
