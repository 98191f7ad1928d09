//! autopatch - bring local files up to the versions a patch server advertises
//!
//! Reads the endpoint from autopatch_config.txt (or --endpoint), compares
//! the server's advertisement with autopatch_versions.txt, and downloads
//! every missing or stale file.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use autopatch::cli::ClientOpts;
use autopatch::client;
use autopatch::log::TransferLog;
use autopatch::logger::{Logger, MultiLogger, TextLogger};
use autopatch::progress::ConsoleLogger;

fn main() -> Result<()> {
    // Set up Ctrl-C handler
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // Exit immediately with 130 (128 + SIGINT)
        std::process::exit(130);
    })
    .context("Error setting Ctrl-C handler")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let opts = ClientOpts::parse();
    let config = opts.to_config().context("Failed to resolve client configuration")?;

    // Choose loggers once
    let mut loggers: Vec<Box<dyn Logger>> = Vec::new();
    if !opts.quiet {
        loggers.push(Box::new(ConsoleLogger::new()));
    }
    if let Some(ref p) = opts.log_file {
        let text = TextLogger::new(p)
            .with_context(|| format!("Failed to open log file {}", p.display()))?;
        loggers.push(Box::new(text));
    }
    if let Some(ref p) = opts.json_log {
        loggers.push(Box::new(TransferLog::new(p)));
    }
    let logger = MultiLogger::new(loggers);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    match rt.block_on(client::run(&config, &logger)) {
        Ok(_) => Ok(()),
        Err(e) => {
            logger.error("patch", &e.to_string());
            Err(e).with_context(|| format!("Patching from {} failed", config.endpoint))
        }
    }
}
