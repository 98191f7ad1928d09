use crate::logger::Logger;
use crate::manifest::ManifestEntry;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransferLogEntry {
    pub timestamp: String,
    pub path: Option<String>,
    pub version: Option<String>,
    pub status: TransferStatus,
    pub bytes: u64,
    pub error: Option<String>,
}

/// JSONL journal of transfers, one object per line.
pub struct TransferLog {
    log_file_path: PathBuf,
}

impl TransferLog {
    pub fn new(log_file_path: impl Into<PathBuf>) -> Self {
        TransferLog {
            log_file_path: log_file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_file_path
    }

    pub fn add_entry(&self, entry: TransferLogEntry) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .context("Failed to open transfer log file")?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<TransferLogEntry>> {
        if !self.log_file_path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.log_file_path)
            .context("Failed to open transfer log file for reading")?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: TransferLogEntry = serde_json::from_str(&line)?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn record(
        &self,
        path: Option<&str>,
        version: Option<String>,
        status: TransferStatus,
        bytes: u64,
        error: Option<&str>,
    ) {
        // Journal failures must not abort a patch run.
        let _ = self.add_entry(TransferLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            path: path.map(str::to_string),
            version,
            status,
            bytes,
            error: error.map(str::to_string),
        });
    }
}

impl Logger for TransferLog {
    fn download_started(&self, path: &str, size: u64) {
        self.record(Some(path), None, TransferStatus::InProgress, size, None);
    }
    fn ledger_updated(&self, entry: &ManifestEntry, bytes: u64) {
        self.record(
            Some(&entry.path),
            Some(entry.version.to_string()),
            TransferStatus::Completed,
            bytes,
            None,
        );
    }
    fn error(&self, context: &str, msg: &str) {
        let msg = format!("{}: {}", context, msg);
        self.record(None, None, TransferStatus::Failed, 0, Some(&msg));
    }
}
