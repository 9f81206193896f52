use super::{SocketCapability, SocketId, StatsSnapshot};
use crate::Result;

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info};

/// Capability adapter over a UDP socket
///
/// Caller mode targets a fixed remote address. Listener mode binds locally
/// and latches the peer address from the first datagram it receives; writes
/// before a peer is known are accepted as zero-byte sends.
pub struct UdpCapability {
    id: SocketId,
    socket: UdpSocket,
    peer: Mutex<Option<SocketAddr>>,
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

impl UdpCapability {
    /// Binds an ephemeral local port and targets `remote`
    pub async fn caller(remote: SocketAddr) -> Result<Self> {
        let bind_addr: SocketAddr = if remote.is_ipv4() {
            "0.0.0.0:0".parse().expect("valid wildcard address")
        } else {
            "[::]:0".parse().expect("valid wildcard address")
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        debug!(local = %socket.local_addr()?, %remote, "udp caller socket bound");
        Ok(Self {
            id: SocketId::next(),
            socket,
            peer: Mutex::new(Some(remote)),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
        })
    }

    /// Binds `local` and waits for the first peer to show up
    pub async fn listener(local: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        debug!(local = %socket.local_addr()?, "udp listener socket bound");
        Ok(Self {
            id: SocketId::next(),
            socket,
            peer: Mutex::new(None),
            bytes_in: AtomicU64::new(0),
            bytes_out: AtomicU64::new(0),
        })
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn current_peer(&self) -> Option<SocketAddr> {
        *self.peer.lock().expect("udp peer lock poisoned")
    }
}

#[async_trait]
impl SocketCapability for UdpCapability {
    fn id(&self) -> SocketId {
        self.id
    }

    /// Receives one datagram. An elapsed timeout or an empty datagram yields
    /// `Ok(0)`, which callers treat as a spurious wake.
    async fn read(&self, buf: &mut [u8], read_timeout: Option<Duration>) -> Result<usize> {
        let (n, from) = match read_timeout {
            Some(limit) => match timeout(limit, self.socket.recv_from(buf)).await {
                Ok(res) => res?,
                Err(_) => return Ok(0),
            },
            None => self.socket.recv_from(buf).await?,
        };

        let mut peer = self.peer.lock().expect("udp peer lock poisoned");
        if peer.is_none() {
            info!(%from, "udp peer latched from first datagram");
            *peer = Some(from);
        }
        drop(peer);

        self.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    /// Sends one datagram to the known peer. With no peer latched yet the
    /// data is dropped and a zero-byte send is reported.
    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let Some(peer) = self.current_peer() else {
            debug!(size = buf.len(), "udp write before a peer is known, dropping");
            return Ok(0);
        };

        let n = self.socket.send_to(buf, peer).await?;
        self.bytes_out.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
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

    #[tokio::test]
    async fn listener_latches_peer_and_replies() {
        let listener = UdpCapability::listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let listener_addr = listener.local_addr().unwrap();

        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        remote.send_to(b"ping", listener_addr).await.unwrap();

        let mut buf = [0u8; 16];
        let n = listener.read(&mut buf, None).await.unwrap();
        assert_eq!(&buf[..n], b"ping");

        let written = listener.write(b"pong").await.unwrap();
        assert_eq!(written, 4);

        let mut reply = [0u8; 16];
        let (n, _) = remote.recv_from(&mut reply).await.unwrap();
        assert_eq!(&reply[..n], b"pong");
    }

    #[tokio::test]
    async fn write_without_peer_is_dropped() {
        let listener = UdpCapability::listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let written = listener.write(b"lost").await.unwrap();
        assert_eq!(written, 0);
        assert_eq!(listener.snapshot().bytes_out, 0);
    }

    #[tokio::test]
    async fn read_timeout_is_a_spurious_wake() {
        let listener = UdpCapability::listener("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let mut buf = [0u8; 16];
        let n = listener
            .read(&mut buf, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
