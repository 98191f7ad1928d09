//! Patch client session.
//!
//! One run is strictly sequential on a single connection: load the ledger,
//! read the advertisement while diffing it, then request, download, write
//! and record each pending file in turn. The first error ends the run;
//! files recorded before it stay recorded.

use crate::config::ClientConfig;
use crate::diff::Verdict;
use crate::error::Result;
use crate::logger::Logger;
use crate::manifest::{Ledger, LedgerRole, Manifest, ManifestEntry};
use crate::paths::normalize_under_root;
use crate::protocol;
use crate::transfer;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entries the server advertised.
    pub advertised: usize,
    /// Entries that were already current.
    pub up_to_date: usize,
    /// Entries fetched and recorded, in fetch order.
    pub fetched: Vec<ManifestEntry>,
    /// Payload bytes received.
    pub bytes: u64,
}

pub async fn connect(addr: SocketAddr) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

/// Load the ledger, connect, and patch everything that changed.
pub async fn run(config: &ClientConfig, logger: &dyn Logger) -> Result<SyncReport> {
    // Ledger problems abort before any network I/O.
    let local = config.ledger.load(LedgerRole::Client)?;

    let stream = connect(config.endpoint).await?;
    logger.connected(&config.endpoint.to_string());

    patch(stream, &local, &config.ledger, config.progress_interval, logger).await
}

/// Run a session over an already connected stream.
pub async fn patch<S>(
    stream: S,
    local: &Manifest,
    ledger: &Ledger,
    progress_interval: Duration,
    logger: &dyn Logger,
) -> Result<SyncReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let (rd, wr) = tokio::io::split(stream);
    let mut reader = BufReader::new(rd);
    let mut writer = BufWriter::new(wr);

    let mut report = SyncReport::default();
    let pending = protocol::receive_advertisement(&mut reader, local, |entry, verdict| {
        report.advertised += 1;
        if verdict == Verdict::UpToDate {
            report.up_to_date += 1;
        }
        logger.advertised(entry, verdict);
    })
    .await?;
    logger.pending(pending.len());

    for entry in pending {
        let bytes = fetch(&mut reader, &mut writer, &entry, ledger, progress_interval, logger).await?;
        report.bytes += bytes;
        report.fetched.push(entry);
    }

    logger.done(
        report.fetched.len() as u64,
        report.bytes,
        started.elapsed().as_secs_f64(),
    );
    Ok(report)
}

/// Request one file, store it, and record its version.
async fn fetch<R, W>(
    reader: &mut R,
    writer: &mut W,
    entry: &ManifestEntry,
    ledger: &Ledger,
    progress_interval: Duration,
    logger: &dyn Logger,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // Refuse paths outside the root before asking for the bytes.
    let dest = normalize_under_root(ledger.root(), &entry.path)?;

    logger.requesting(&entry.path);
    protocol::write_line(writer, &entry.path).await?;
    writer.flush().await?;

    let size = transfer::read_size(reader).await?;
    logger.download_started(&entry.path, size);

    let data = transfer::receive_payload(reader, size, progress_interval, |p| {
        logger.progress(&entry.path, p)
    })
    .await?;
    let bytes = data.len() as u64;
    logger.download_complete(&entry.path, bytes);

    transfer::write_file(&dest, &data)?;
    logger.file_written(&entry.path, bytes);

    ledger.persist(&entry.path, &entry.version)?;
    logger.ledger_updated(entry, bytes);
    Ok(bytes)
}
