//! Socket capability contract and concrete adapters
//!
//! A capability is the minimal read/write/identity surface a socket-like
//! object must satisfy to be relayed. The relay engine only ever talks to
//! this trait; concrete adapters (TCP, UDP) are picked by the connection
//! acquirer from the endpoint scheme.

use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub mod tcp;
pub mod udp;

pub use tcp::TcpCapability;
pub use udp::UdpCapability;

static NEXT_SOCKET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one established connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    /// Allocates the next identity from a process-wide counter
    pub fn next() -> Self {
        SocketId(NEXT_SOCKET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only byte counters reported by a capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Bytes successfully read from this socket
    pub bytes_in: u64,
    /// Bytes successfully written to this socket
    pub bytes_out: u64,
}

/// Minimal contract a socket-like object must satisfy to be relayed
///
/// Shared between the relay orchestrator (read/write) and the stats registry
/// (snapshot only); the registry must treat the capability as read-only.
#[async_trait]
pub trait SocketCapability: Send + Sync {
    /// Returns the process-unique identity of this connection
    fn id(&self) -> SocketId;

    /// Reads up to `buf.len()` bytes from the socket.
    ///
    /// Blocks until data arrives, the socket fails, or `timeout` elapses.
    /// `Ok(0)` is a spurious wake (or an elapsed timeout), never end of
    /// stream; adapters surface a closed connection as a fatal
    /// [`RelayError::Capability`](crate::RelayError::Capability).
    async fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize>;

    /// Writes `buf` to the socket, returning the number of bytes accepted.
    ///
    /// May accept fewer bytes than offered; callers decide what to do with
    /// the remainder.
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Returns the current byte counters for stats reporting
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::default()
    }
}

impl fmt::Debug for dyn SocketCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketCapability")
            .field("id", &self.id())
            .finish()
    }
}
