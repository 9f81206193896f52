use super::{SocketCapability, SocketId, StatsSnapshot};
use crate::{RelayError, Result};

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Capability adapter over an established TCP connection
///
/// The stream is split so the two pump directions can read and write
/// concurrently without contending on one lock.
pub struct TcpCapability {
    id: SocketId,
    peer: SocketAddr,
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

impl TcpCapability {
    /// Wraps an established stream (from a connect or an accept)
    pub fn new(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            id: SocketId::next(),
            peer,
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
        })
    }

    /// Address of the remote peer
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl SocketCapability for TcpCapability {
    fn id(&self) -> SocketId {
        self.id
    }

    /// Reads from the stream. An elapsed timeout yields `Ok(0)` (spurious
    /// wake); a zero-byte read from the OS is end of stream and surfaces as
    /// a fatal capability error.
    async fn read(&self, buf: &mut [u8], read_timeout: Option<Duration>) -> Result<usize> {
        let mut reader = self.reader.lock().await;
        let n = match read_timeout {
            Some(limit) => match timeout(limit, reader.read(buf)).await {
                Ok(res) => res?,
                Err(_) => return Ok(0),
            },
            None => reader.read(buf).await?,
        };

        if n == 0 && !buf.is_empty() {
            return Err(RelayError::Capability(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed by {}", self.peer),
            )));
        }

        self.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await?;
        self.bytes_out.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(buf.len())
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpCapability, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (TcpCapability::new(client).unwrap(), server)
    }

    #[tokio::test]
    async fn read_and_write_update_counters() {
        let (cap, mut peer) = connected_pair().await;

        peer.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 16];
        let n = cap.read(&mut buf, None).await.unwrap();
        assert_eq!(&buf[..n], b"hello");

        let written = cap.write(b"world!").await.unwrap();
        assert_eq!(written, 6);

        let snapshot = cap.snapshot();
        assert_eq!(snapshot.bytes_in, 5);
        assert_eq!(snapshot.bytes_out, 6);
    }

    #[tokio::test]
    async fn peer_close_is_a_fatal_error() {
        let (cap, peer) = connected_pair().await;
        drop(peer);

        let mut buf = [0u8; 16];
        let err = cap.read(&mut buf, None).await.unwrap_err();
        assert!(matches!(err, RelayError::Capability(_)));
    }

    #[tokio::test]
    async fn read_timeout_is_a_spurious_wake() {
        let (cap, _peer) = connected_pair().await;

        let mut buf = [0u8; 16];
        let n = cap
            .read(&mut buf, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
