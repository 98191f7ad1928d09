use crate::diff::Verdict;
use crate::manifest::ManifestEntry;
use crate::transfer::Progress;
use anyhow::Result;
use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Observer for client session events. Every hook defaults to a no-op.
pub trait Logger: Send + Sync {
    fn connected(&self, _peer: &str) {}
    fn advertised(&self, _entry: &ManifestEntry, _verdict: Verdict) {}
    fn pending(&self, _count: usize) {}
    fn requesting(&self, _path: &str) {}
    fn download_started(&self, _path: &str, _size: u64) {}
    fn progress(&self, _path: &str, _progress: Progress) {}
    fn download_complete(&self, _path: &str, _bytes: u64) {}
    fn file_written(&self, _path: &str, _bytes: u64) {}
    fn ledger_updated(&self, _entry: &ManifestEntry, _bytes: u64) {}
    fn error(&self, _context: &str, _msg: &str) {}
    fn done(&self, _files: u64, _bytes: u64, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Forwards every event to each inner logger in order.
pub struct MultiLogger {
    loggers: Vec<Box<dyn Logger>>,
}

impl MultiLogger {
    pub fn new(loggers: Vec<Box<dyn Logger>>) -> Self {
        Self { loggers }
    }
}

impl Logger for MultiLogger {
    fn connected(&self, peer: &str) {
        self.loggers.iter().for_each(|l| l.connected(peer));
    }
    fn advertised(&self, entry: &ManifestEntry, verdict: Verdict) {
        self.loggers.iter().for_each(|l| l.advertised(entry, verdict));
    }
    fn pending(&self, count: usize) {
        self.loggers.iter().for_each(|l| l.pending(count));
    }
    fn requesting(&self, path: &str) {
        self.loggers.iter().for_each(|l| l.requesting(path));
    }
    fn download_started(&self, path: &str, size: u64) {
        self.loggers.iter().for_each(|l| l.download_started(path, size));
    }
    fn progress(&self, path: &str, progress: Progress) {
        self.loggers.iter().for_each(|l| l.progress(path, progress));
    }
    fn download_complete(&self, path: &str, bytes: u64) {
        self.loggers.iter().for_each(|l| l.download_complete(path, bytes));
    }
    fn file_written(&self, path: &str, bytes: u64) {
        self.loggers.iter().for_each(|l| l.file_written(path, bytes));
    }
    fn ledger_updated(&self, entry: &ManifestEntry, bytes: u64) {
        self.loggers.iter().for_each(|l| l.ledger_updated(entry, bytes));
    }
    fn error(&self, context: &str, msg: &str) {
        self.loggers.iter().for_each(|l| l.error(context, msg));
    }
    fn done(&self, files: u64, bytes: u64, seconds: f64) {
        self.loggers.iter().for_each(|l| l.done(files, bytes, seconds));
    }
}

pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        if let Ok(mut f) = self.file.lock() {
            let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
        }
    }
}

impl Logger for TextLogger {
    fn connected(&self, peer: &str) {
        self.line(&format!("CONNECT peer={}", peer));
    }
    fn advertised(&self, entry: &ManifestEntry, verdict: Verdict) {
        let state = match verdict {
            Verdict::UpToDate => "up-to-date",
            Verdict::Pending => "pending",
        };
        self.line(&format!(
            "ADVERTISED path={} version={} state={}",
            entry.path, entry.version, state
        ));
    }
    fn pending(&self, count: usize) {
        self.line(&format!("PENDING files={count}"));
    }
    fn download_started(&self, path: &str, size: u64) {
        self.line(&format!("DOWNLOAD path={} size={}", path, size));
    }
    fn file_written(&self, path: &str, bytes: u64) {
        self.line(&format!("WRITE path={} bytes={}", path, bytes));
    }
    fn ledger_updated(&self, entry: &ManifestEntry, _bytes: u64) {
        self.line(&format!("LEDGER path={} version={}", entry.path, entry.version));
    }
    fn error(&self, context: &str, msg: &str) {
        self.line(&format!("ERROR ctx={} msg={}", context, msg));
    }
    fn done(&self, files: u64, bytes: u64, seconds: f64) {
        self.line(&format!("DONE files={files} bytes={bytes} seconds={seconds:.3}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Counter(Arc<AtomicUsize>);
    impl Logger for Counter {
        fn ledger_updated(&self, _entry: &ManifestEntry, _bytes: u64) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn multi_logger_fans_out() {
        let hits = Arc::new(AtomicUsize::new(0));
        let multi = MultiLogger::new(vec![
            Box::new(Counter(hits.clone())),
            Box::new(NoopLogger),
            Box::new(Counter(hits.clone())),
        ]);
        multi.ledger_updated(&ManifestEntry::new("a", Version::parse("1").unwrap()), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn text_logger_appends_timestamped_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("logs").join("patch.log");
        let logger = TextLogger::new(&path).unwrap();

        logger.connected("127.0.0.1:9031");
        logger.ledger_updated(&ManifestEntry::new("game.exe", Version::parse("1.2").unwrap()), 7);
        logger.done(1, 42, 0.5);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("CONNECT peer=127.0.0.1:9031"));
        assert!(lines[1].ends_with("LEDGER path=game.exe version=1.2"));
        assert!(lines[2].ends_with("DONE files=1 bytes=42 seconds=0.500"));
    }
}
