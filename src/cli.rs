//! Shared CLI helpers and small reusable Clap fragments

use crate::config::{
    resolve_endpoint, ClientConfig, ServerConfig, CLIENT_CONFIG_FILE, CLIENT_LEDGER_FILE,
    SERVER_CONFIG_FILE, SERVER_LEDGER_FILE,
};
use crate::error::Result;
use clap::Parser;
use std::path::PathBuf;

/// Patch client options
#[derive(Clone, Debug, Parser)]
#[command(
    name = "autopatch",
    version,
    about = "Fetch every file whose version differs from the patch server's"
)]
pub struct ClientOpts {
    /// File holding the server endpoint (address:port)
    #[arg(long, default_value = CLIENT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Server endpoint (address:port); overrides --config
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Local version ledger, relative to --root
    #[arg(long, default_value = CLIENT_LEDGER_FILE)]
    pub ledger: PathBuf,

    /// Directory the patched files live in
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Append timestamped text log lines to file
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Append JSONL transfer records to file
    #[arg(long = "json-log")]
    pub json_log: Option<PathBuf>,

    /// No console output
    #[arg(short, long)]
    pub quiet: bool,
}

impl ClientOpts {
    pub fn to_config(&self) -> Result<ClientConfig> {
        let endpoint = resolve_endpoint(self.endpoint.as_deref(), &self.config)?;
        Ok(ClientConfig::new(endpoint, &self.root).with_ledger_file(&self.ledger))
    }
}

/// Patch server options
#[derive(Clone, Debug, Parser)]
#[command(name = "autopatchd", version, about = "Serve versioned files to autopatch clients")]
pub struct DaemonOpts {
    /// File holding the bind endpoint (address:port)
    #[arg(long, default_value = SERVER_CONFIG_FILE)]
    pub config: PathBuf,

    /// Bind address (address:port); overrides --config
    #[arg(long)]
    pub bind: Option<String>,

    /// Authoritative version ledger, relative to --root
    #[arg(long, default_value = SERVER_LEDGER_FILE)]
    pub ledger: PathBuf,

    /// Root directory to serve
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

impl DaemonOpts {
    pub fn to_config(&self) -> Result<ServerConfig> {
        let bind = resolve_endpoint(self.bind.as_deref(), &self.config)?;
        Ok(ServerConfig::new(bind, &self.root).with_ledger_file(&self.ledger))
    }
}
