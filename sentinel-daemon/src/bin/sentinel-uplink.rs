//! Uplink supervisor: reconciles the user's streaming intent against
//! available multicast signals and supervises encoder → RTMP pipelines.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sentinel_core::{
    EncoderPool, StateRegistry, UplinkSupervisor, load_destinations,
    load_presets, pipeline::GST_LAUNCH,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments for the Sentinel uplink supervisor
#[derive(Parser, Debug)]
#[command(name = "sentinel-uplink")]
#[command(about = "Intent-driven RTMP encoding supervisor")]
struct Args {
    /// Directory holding the persistent state documents
    #[arg(long, env = "SENTINEL_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Static streaming destinations catalogue
    #[arg(
        long,
        env = "SENTINEL_DESTINATIONS",
        default_value = "stream_config.json"
    )]
    destinations: PathBuf,

    /// Static encoding presets catalogue
    #[arg(long, env = "SENTINEL_PRESETS", default_value = "encoding_presets.json")]
    presets: PathBuf,

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

    // Unreadable static configuration is fatal at startup; per-tick
    // re-reads merely idle the supervisor.
    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory {}", args.data_dir.display())
    })?;
    load_destinations(&args.destinations)
        .context("destinations catalogue unusable")?;
    load_presets(&args.presets).context("presets catalogue unusable")?;

    let registry = Arc::new(StateRegistry::new(&args.data_dir));
    let pool = EncoderPool::with_launcher(
        Arc::clone(&registry),
        args.gst_launch.as_str(),
    );
    let supervisor = UplinkSupervisor::new(
        registry,
        pool,
        &args.destinations,
        &args.presets,
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let worker = tokio::spawn(supervisor.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("received interrupt, shutting down");

    let _ = shutdown_tx.send(()).await;
    worker.await.context("uplink supervisor task failed")?;

    Ok(())
}
