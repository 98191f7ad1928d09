//! Patch server.
//!
//! The manifest and every payload are loaded once into a [`Snapshot`] and
//! shared read-only by all connection tasks. Each accepted connection gets
//! its own task: advertise once, then answer path requests until the peer
//! hangs up. There is no connection cap and no idle timeout.

use crate::error::{PatchError, Result};
use crate::manifest::{Ledger, LedgerRole, Manifest, ManifestEntry};
use crate::protocol;
use crate::transfer;
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Immutable server state: the advertised manifest and the file bytes.
#[derive(Debug, Default)]
pub struct Snapshot {
    manifest: Manifest,
    payloads: HashMap<String, Vec<u8>>,
}

impl Snapshot {
    /// Load the server ledger and read every listed file into memory.
    pub fn load(ledger: &Ledger) -> Result<Self> {
        let manifest = ledger.load(LedgerRole::Server)?;
        info!(files = manifest.len(), "loading files");

        let mut payloads = HashMap::with_capacity(manifest.len());
        for entry in &manifest {
            let path = ledger.resolve(&entry.path);
            let data = fs::read(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    PatchError::NotFound(format!("could not find {}", entry.path))
                }
                _ => PatchError::Io(e),
            })?;
            info!(path = %entry.path, bytes = data.len(), "loaded");
            payloads.insert(entry.path.clone(), data);
        }
        info!("files loaded");
        Ok(Self { manifest, payloads })
    }

    /// Build a snapshot from in-memory entries, in the given order.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ManifestEntry, Vec<u8>)>,
    {
        let mut snapshot = Self::default();
        for (entry, data) in entries {
            snapshot.payloads.insert(entry.path.clone(), data);
            snapshot.manifest.insert(entry)?;
        }
        Ok(snapshot)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn payload(&self, path: &str) -> Option<&[u8]> {
        self.payloads.get(path).map(Vec::as_slice)
    }

    /// Total bytes held in memory.
    pub fn total_bytes(&self) -> u64 {
        self.payloads.values().map(|p| p.len() as u64).sum()
    }
}

/// Per-connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub served: u64,
    pub ignored: u64,
    pub bytes: u64,
}

/// Bind and serve forever.
pub async fn serve(bind: SocketAddr, snapshot: Arc<Snapshot>) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "started listening");
    serve_listener(listener, snapshot).await
}

/// Accept loop over an existing listener; one task per connection.
pub async fn serve_listener(listener: TcpListener, snapshot: Arc<Snapshot>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        info!(%peer, "new connection");

        let snapshot = Arc::clone(&snapshot);
        tokio::spawn(async move {
            match handle_connection(stream, &snapshot, &peer.to_string()).await {
                Ok(stats) => info!(
                    %peer,
                    served = stats.served,
                    ignored = stats.ignored,
                    bytes = stats.bytes,
                    "connection closed"
                ),
                Err(e) => error!(%peer, error = %e, "connection failed"),
            }
        });
    }
}

/// Advertise the manifest, then answer requests until end of stream.
///
/// Unknown paths get no reply at all; the loop just reads the next line.
pub async fn handle_connection<S>(stream: S, snapshot: &Snapshot, peer: &str) -> Result<ConnectionStats>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (rd, wr) = tokio::io::split(stream);
    let mut reader = BufReader::new(rd);
    let mut writer = BufWriter::new(wr);

    debug!(peer, entries = snapshot.manifest().len(), "sending patch data");
    protocol::send_advertisement(&mut writer, snapshot.manifest()).await?;

    let mut stats = ConnectionStats::default();
    while let Some(request) = protocol::read_line(&mut reader).await? {
        match snapshot.payload(&request) {
            Some(payload) => {
                info!(peer, path = %request, bytes = payload.len(), "request");
                transfer::send_payload(&mut writer, payload).await?;
                stats.served += 1;
                stats.bytes += payload.len() as u64;
                debug!(peer, path = %request, "request complete");
            }
            None => {
                debug!(peer, path = %request, "ignoring unknown request");
                stats.ignored += 1;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Verdict;
    use crate::version::Version;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    fn entry(path: &str, ver: &str) -> ManifestEntry {
        ManifestEntry::new(path, Version::parse(ver).unwrap())
    }

    fn snapshot() -> Snapshot {
        Snapshot::from_entries(vec![
            (entry("b.bin", "1.0"), b"bravo".to_vec()),
            (entry("a.bin", "2.0.1"), vec![1u8; 3000]),
        ])
        .unwrap()
    }

    async fn request(
        reader: &mut BufReader<tokio::io::ReadHalf<DuplexStream>>,
        writer: &mut tokio::io::WriteHalf<DuplexStream>,
        path: &str,
    ) -> Vec<u8> {
        writer.write_all(format!("{}\n", path).as_bytes()).await.unwrap();
        let size = transfer::read_size(reader).await.unwrap();
        transfer::receive_payload(reader, size, Duration::from_secs(1), |_| {})
            .await
            .unwrap()
    }

    #[test]
    fn load_reads_every_listed_file() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(tmp.path().join("data/a.pak"), b"alpha").unwrap();
        fs::write(tmp.path().join("game.exe"), b"exe").unwrap();
        fs::write(tmp.path().join("versions.txt"), "game.exe:1.2\ndata/a.pak:3.0").unwrap();

        let snap = Snapshot::load(&Ledger::new(tmp.path().join("versions.txt"), tmp.path())).unwrap();
        assert_eq!(snap.manifest().paths().collect::<Vec<_>>(), vec!["game.exe", "data/a.pak"]);
        assert_eq!(snap.payload("data/a.pak"), Some(&b"alpha"[..]));
        assert_eq!(snap.total_bytes(), 8);
    }

    #[test]
    fn load_requires_ledger() {
        let tmp = TempDir::new().unwrap();
        let err = Snapshot::load(&Ledger::new(tmp.path().join("versions.txt"), tmp.path())).unwrap_err();
        assert!(matches!(err, PatchError::NotFound(_)));
    }

    #[tokio::test]
    async fn advertises_then_serves_requests() {
        let snap = Arc::new(snapshot());
        let (client, server) = tokio::io::duplex(256);
        let handler = {
            let snap = Arc::clone(&snap);
            tokio::spawn(async move { handle_connection(server, &snap, "test").await })
        };

        let (rd, mut wr) = tokio::io::split(client);
        let mut reader = BufReader::new(rd);
        let mut verdicts = Vec::new();
        let pending = protocol::receive_advertisement(&mut reader, &Manifest::new(), |e, v| {
            verdicts.push((e.to_string(), v))
        })
        .await
        .unwrap();
        assert_eq!(
            verdicts,
            vec![
                ("b.bin:1.0".to_string(), Verdict::Pending),
                ("a.bin:2.0.1".to_string(), Verdict::Pending)
            ]
        );
        assert_eq!(pending.len(), 2);

        assert_eq!(request(&mut reader, &mut wr, "a.bin").await, vec![1u8; 3000]);
        assert_eq!(request(&mut reader, &mut wr, "b.bin").await, b"bravo");
        // Same file twice on one connection.
        assert_eq!(request(&mut reader, &mut wr, "b.bin").await, b"bravo");

        drop(wr);
        drop(reader);
        let stats = handler.await.unwrap().unwrap();
        assert_eq!(stats.served, 3);
        assert_eq!(stats.ignored, 0);
        assert_eq!(stats.bytes, 3010);
    }

    #[tokio::test]
    async fn unknown_request_gets_no_reply_and_handler_survives() {
        let snap = Arc::new(snapshot());
        let (client, server) = tokio::io::duplex(256);
        let handler = {
            let snap = Arc::clone(&snap);
            tokio::spawn(async move { handle_connection(server, &snap, "test").await })
        };

        let (rd, mut wr) = tokio::io::split(client);
        let mut reader = BufReader::new(rd);
        protocol::receive_advertisement(&mut reader, &Manifest::new(), |_, _| {})
            .await
            .unwrap();

        wr.write_all(b"missing.bin\n\nend of patch data\n").await.unwrap();
        // The only reply on the stream is the one for b.bin.
        assert_eq!(request(&mut reader, &mut wr, "b.bin").await, b"bravo");

        drop(wr);
        drop(reader);
        let stats = handler.await.unwrap().unwrap();
        assert_eq!(stats.served, 1);
        assert_eq!(stats.ignored, 3);
    }

    #[tokio::test]
    async fn listener_serves_concurrent_clients() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_listener(listener, Arc::new(snapshot())));

        // An idle connection must not hold up the others.
        let idle = tokio::net::TcpStream::connect(addr).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..4 {
            tasks.push(tokio::spawn(async move {
                let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                let (rd, mut wr) = tokio::io::split(stream);
                let mut reader = BufReader::new(rd);
                protocol::receive_advertisement(&mut reader, &Manifest::new(), |_, _| {})
                    .await
                    .unwrap();
                wr.write_all(b"a.bin\n").await.unwrap();
                let size = transfer::read_size(&mut reader).await.unwrap();
                transfer::receive_payload(&mut reader, size, Duration::from_secs(1), |_| {})
                    .await
                    .unwrap()
            }));
        }
        for t in tasks {
            assert_eq!(t.await.unwrap(), vec![1u8; 3000]);
        }

        drop(idle);
        server.abort();
    }
}
