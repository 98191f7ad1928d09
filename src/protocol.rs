//! Shared protocol constants and line codec for the patch transport
//!
//! Everything on the wire is a newline-terminated text line except the raw
//! payload that follows a size line:
//!
//! ```text
//! Client                              Server
//!   |<------- path:version ------------|  (one per manifest entry)
//!   |<------- end of patch data -------|
//!   |-------- path ------------------->|
//!   |<------- size --------------------|
//!   |<------- <size raw bytes> --------|
//!   |-------- path ------------------->|
//!   ...
//! ```

use crate::diff::{DiffEngine, PendingSet, Verdict};
use crate::error::{PatchError, Result};
use crate::manifest::{Manifest, ManifestEntry};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Terminates the advertisement. Never parsed as an entry.
pub const SENTINEL: &str = "end of patch data";

/// Raw read chunk for payload bodies.
pub const CHUNK_SIZE: usize = 64 * 1024;

// Centralized interval constants
pub mod intervals {
    // Minimum wall-clock gap between download progress observations (ms)
    pub const PROGRESS_MS: u64 = 1000;
}

/// Read one line without its terminator. `None` means the peer closed the
/// stream. Invalid UTF-8 is replaced rather than rejected.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Write one line. Does not flush.
pub async fn write_line<W>(writer: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

/// Parse a size line: decimal digits only.
pub fn parse_size(line: &str) -> Result<u64> {
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PatchError::format(format!("invalid size '{}'", line)));
    }
    line.parse()
        .map_err(|_| PatchError::format(format!("size out of range '{}'", line)))
}

/// Server side of the handshake: every entry in manifest order, the
/// sentinel, then a flush.
pub async fn send_advertisement<W>(writer: &mut W, manifest: &Manifest) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for entry in manifest {
        write_line(writer, &entry.to_string()).await?;
    }
    write_line(writer, SENTINEL).await?;
    writer.flush().await?;
    Ok(())
}

/// Client side of the handshake.
///
/// Records are diffed against `local` as they arrive; `on_entry` sees each
/// verdict. Stops at the sentinel and does not read past it.
pub async fn receive_advertisement<R, F>(
    reader: &mut R,
    local: &Manifest,
    mut on_entry: F,
) -> Result<PendingSet>
where
    R: AsyncBufRead + Unpin,
    F: FnMut(&ManifestEntry, Verdict),
{
    let mut engine = DiffEngine::new(local);
    loop {
        let line = read_line(reader)
            .await?
            .ok_or_else(|| PatchError::protocol("connection closed before end of patch data"))?;
        if line == SENTINEL {
            break;
        }
        let entry = ManifestEntry::parse_line(&line)?;
        let verdict = engine.observe(entry.clone())?;
        on_entry(&entry, verdict);
    }
    Ok(engine.finish())
}
