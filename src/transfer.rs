//! Length-prefixed single-file transfer.
//!
//! The sender writes the decimal payload length on its own line, flushes,
//! then writes the raw bytes with nothing after them. The receiver reads
//! the size line and then exactly that many bytes, so the same stream can
//! carry the next request/response pair.

use crate::error::{PatchError, Result};
use crate::paths::ensure_parent_exists;
use crate::protocol::{self, CHUNK_SIZE};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest up-front reservation for a payload buffer.
const MAX_PREALLOC: usize = 8 * 1024 * 1024;

/// One progress observation for an in-flight download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub received: u64,
    pub total: u64,
}

/// Rate limiter for progress observations. The first tick always fires.
#[derive(Debug)]
pub struct ProgressClock {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when at least `interval` has passed since the last firing.
    pub fn tick(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Serve one payload: size line, flush, raw bytes, flush.
pub async fn send_payload<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    protocol::write_line(writer, &payload.len().to_string()).await?;
    writer.flush().await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the size line that precedes a payload.
pub async fn read_size<R>(reader: &mut R) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let line = protocol::read_line(reader)
        .await?
        .ok_or_else(|| PatchError::protocol("connection closed before size line"))?;
    protocol::parse_size(&line)
}

/// Accumulate exactly `size` payload bytes in memory.
///
/// Reads whatever chunk sizes the transport yields but never past the
/// payload boundary. `on_progress` fires on the first chunk and then at
/// most once per `interval`.
pub async fn receive_payload<R, F>(
    reader: &mut R,
    size: u64,
    interval: Duration,
    mut on_progress: F,
) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(Progress),
{
    let total = usize::try_from(size)
        .map_err(|_| PatchError::format(format!("payload of {} bytes does not fit in memory", size)))?;
    let mut data = Vec::with_capacity(total.min(MAX_PREALLOC));
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut clock = ProgressClock::new(interval);

    while data.len() < total {
        let want = (total - data.len()).min(chunk.len());
        let n = reader.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(PatchError::protocol(format!(
                "connection closed after {} of {} payload bytes",
                data.len(),
                total
            )));
        }
        data.extend_from_slice(&chunk[..n]);

        if clock.tick() {
            on_progress(Progress {
                received: data.len() as u64,
                total: size,
            });
        }
    }
    Ok(data)
}

/// Replace the file at `dest` with `bytes`: delete, then create and write.
pub fn write_file(dest: &Path, bytes: &[u8]) -> Result<()> {
    if dest.exists() {
        fs::remove_file(dest)?;
    }
    ensure_parent_exists(dest)?;
    let mut f = File::create(dest)?;
    f.write_all(bytes)?;
    f.flush()?;
    Ok(())
}
