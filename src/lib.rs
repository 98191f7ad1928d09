//! Autopatch Library
//!
//! Versioned file distribution: a server advertises the version of every
//! file it holds, clients fetch whatever differs from their local ledger.

pub mod cli;
pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod log;
pub mod logger;
pub mod manifest;
pub mod paths;
pub mod progress;
pub mod protocol;
pub mod server;
pub mod transfer;
pub mod version;

pub use error::{PatchError, Result};
pub use manifest::{Ledger, LedgerRole, Manifest, ManifestEntry};
pub use version::Version;
