//! Console reporting for the patch client
//!
//! Session steps print as plain lines above a byte progress bar that is
//! shown only while a download is in flight.

use crate::diff::Verdict;
use crate::logger::Logger;
use crate::manifest::ManifestEntry;
use crate::transfer::Progress;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

pub struct ConsoleLogger {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleLogger {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    /// Print above the bar when one is active.
    fn say(&self, msg: &str) {
        match self.bar.lock().ok().as_deref().and_then(|b| b.as_ref()) {
            Some(bar) => bar.println(msg),
            None => println!("{}", msg),
        }
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.bar.lock().ok().and_then(|mut b| b.take())
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Logger for ConsoleLogger {
    fn connected(&self, peer: &str) {
        self.say(&format!("Connected to {}.", peer));
    }

    fn advertised(&self, entry: &ManifestEntry, verdict: Verdict) {
        let state = match verdict {
            Verdict::UpToDate => "up-to-date",
            Verdict::Pending => "pending for a patch",
        };
        self.say(&format!("{} ({})", entry, state));
    }

    fn pending(&self, count: usize) {
        self.say(&format!("{} file(s) to be patched...", count));
    }

    fn requesting(&self, path: &str) {
        self.say(&format!("Requesting {}...", path));
    }

    fn download_started(&self, path: &str, size: u64) {
        self.say(&format!("Downloading {} ({}b)...", path, size));
        let bar = ProgressBar::new(size);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn progress(&self, _path: &str, progress: Progress) {
        if let Some(bar) = self.bar.lock().ok().as_deref().and_then(|b| b.as_ref()) {
            bar.set_position(progress.received);
        }
    }

    fn download_complete(&self, path: &str, bytes: u64) {
        if let Some(bar) = self.take_bar() {
            bar.set_position(bytes);
            bar.finish_and_clear();
        }
        self.say(&format!("{}b {} Download Complete!", bytes, path));
    }

    fn file_written(&self, path: &str, _bytes: u64) {
        self.say(&format!("Wrote {}.", path));
    }

    fn ledger_updated(&self, entry: &ManifestEntry, _bytes: u64) {
        self.say(&format!("Updated version of {} to {}.", entry.path, entry.version));
    }

    fn error(&self, context: &str, msg: &str) {
        if let Some(bar) = self.take_bar() {
            bar.abandon();
        }
        eprintln!("{} failed: {}", context, msg);
    }

    fn done(&self, files: u64, bytes: u64, seconds: f64) {
        self.say(&format!(
            "Patching complete! {} file(s), {:.1} MB in {:.1}s. Enjoy!",
            files,
            bytes as f64 / 1_048_576.0,
            seconds
        ));
    }
}
