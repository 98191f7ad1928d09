//! Endpoint files and session configuration.

use crate::error::{PatchError, Result};
use crate::manifest::Ledger;
use crate::protocol::intervals;
use std::fs;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CLIENT_CONFIG_FILE: &str = "autopatch_config.txt";
pub const CLIENT_LEDGER_FILE: &str = "autopatch_versions.txt";
pub const SERVER_CONFIG_FILE: &str = "config.txt";
pub const SERVER_LEDGER_FILE: &str = "versions.txt";

/// Parse `address:port`. Exactly one colon, an IP literal, and a decimal port.
pub fn parse_endpoint(text: &str) -> Result<SocketAddr> {
    let text = text.trim();
    let mut fields = text.split(':');
    let (ip, port) = match (fields.next(), fields.next(), fields.next()) {
        (Some(ip), Some(port), None) => (ip, port),
        _ => return Err(PatchError::format(format!("invalid endpoint format '{}'", text))),
    };
    let ip: IpAddr = ip
        .parse()
        .map_err(|_| PatchError::format(format!("invalid IP address '{}'", ip)))?;
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PatchError::format(format!("invalid port '{}'", port)));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| PatchError::format(format!("invalid port '{}'", port)))?;
    Ok(SocketAddr::new(ip, port))
}

/// Read an endpoint file.
pub fn load_endpoint(path: &Path) -> Result<SocketAddr> {
    match fs::read_to_string(path) {
        Ok(text) => parse_endpoint(&text),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(PatchError::NotFound(format!(
            "could not find {}",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Command-line endpoint if given, otherwise the endpoint file.
pub fn resolve_endpoint(explicit: Option<&str>, config_file: &Path) -> Result<SocketAddr> {
    match explicit {
        Some(text) => parse_endpoint(text),
        None => load_endpoint(config_file),
    }
}

/// Configuration for one client run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server to patch from.
    pub endpoint: SocketAddr,
    /// Local version ledger.
    pub ledger: Ledger,
    /// Minimum gap between progress observations.
    pub progress_interval: Duration,
}

impl ClientConfig {
    pub fn new(endpoint: SocketAddr, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            endpoint,
            ledger: Ledger::new(root.join(CLIENT_LEDGER_FILE), root),
            progress_interval: Duration::from_millis(intervals::PROGRESS_MS),
        }
    }

    /// Use a different ledger file under the same root.
    pub fn with_ledger_file(mut self, file: impl Into<PathBuf>) -> Self {
        let root = self.ledger.root().to_path_buf();
        self.ledger = Ledger::new(root.join(file.into()), root);
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}

/// Configuration for the patch server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Authoritative version ledger.
    pub ledger: Ledger,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            bind_addr,
            ledger: Ledger::new(root.join(SERVER_LEDGER_FILE), root),
        }
    }

    pub fn with_ledger_file(mut self, file: impl Into<PathBuf>) -> Self {
        let root = self.ledger.root().to_path_buf();
        self.ledger = Ledger::new(root.join(file.into()), root);
        self
    }
}
