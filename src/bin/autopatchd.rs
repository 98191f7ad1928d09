use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use autopatch::cli::DaemonOpts;
use autopatch::server::{self, Snapshot};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = DaemonOpts::parse();

    // Validate root directory exists and is a directory
    if !opts.root.is_dir() {
        anyhow::bail!("Error: Root path is not a directory: {}", opts.root.display());
    }

    let config = opts.to_config().context("Failed to resolve bind endpoint")?;

    info!(root = %opts.root.display(), bind = %config.bind_addr, "starting autopatch server");

    // Every payload is read once here and never changes afterwards
    let snapshot = Snapshot::load(&config.ledger)
        .with_context(|| format!("Failed to load {}", config.ledger.path().display()))?;
    info!(
        files = snapshot.manifest().len(),
        bytes = snapshot.total_bytes(),
        "snapshot ready"
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(server::serve(config.bind_addr, Arc::new(snapshot)))
        .with_context(|| format!("Server on {} stopped", config.bind_addr))
}
