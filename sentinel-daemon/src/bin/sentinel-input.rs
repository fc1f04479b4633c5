//! Input supervisor: discovers capture hardware via the external probe
//! and keeps one multicast fan-out pipeline running per signal-bearing
//! input.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sentinel_core::{
    HardwareProbe, InputSupervisor, MulticastPool, StateRegistry,
    pipeline::GST_LAUNCH,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments for the Sentinel input supervisor
#[derive(Parser, Debug)]
#[command(name = "sentinel-input")]
#[command(about = "Hardware discovery and UDP multicast fan-out supervisor")]
struct Args {
    /// Directory holding the persistent state documents
    #[arg(long, env = "SENTINEL_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Path to the hardware probe executable
    #[arg(long, env = "SENTINEL_PROBE", default_value = "sentinel-probe")]
    probe: PathBuf,

    /// Pipeline launcher binary
    #[arg(long, env = "SENTINEL_GST_LAUNCH", default_value = GST_LAUNCH)]
    gst_launch: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // A data directory we cannot create is the one fatal startup error.
    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory {}", args.data_dir.display())
    })?;

    let registry = Arc::new(StateRegistry::new(&args.data_dir));
    let probe = HardwareProbe::new(&args.probe);
    let pool = MulticastPool::with_launcher(args.gst_launch.as_str());
    let supervisor = InputSupervisor::new(registry, probe, pool);

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let worker = tokio::spawn(supervisor.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("received interrupt, shutting down");

    let _ = shutdown_tx.send(()).await;
    worker.await.context("input supervisor task failed")?;

    Ok(())
}
