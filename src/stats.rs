//! Stats lifecycle hookpoints and the CSV report writer
//!
//! The supervisor registers both capabilities with a [`StatsCollector`] when
//! a cycle enters relaying and deregisters them once both pumps have
//! terminated, so the collector never observes a socket that a pump might
//! still be using. Collectors only call [`SocketCapability::snapshot`]; the
//! capability is read-only to them.

use crate::capability::{SocketCapability, SocketId};
use crate::{RelayError, Result};

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Lifecycle hookpoints bracketing a connection's active lifetime
pub trait StatsCollector: Send + Sync {
    /// Called when a connection enters active relaying
    fn add_socket(&self, socket: Arc<dyn SocketCapability>);

    /// Called after every pump using the connection has terminated
    fn remove_socket(&self, id: SocketId);
}

type Registry = Arc<Mutex<HashMap<SocketId, Arc<dyn SocketCapability>>>>;

/// Periodic CSV report of per-socket byte counters
///
/// Appends one line per registered socket every `interval`
/// (`timestamp_ms,socket_id,bytes_in,bytes_out`). The background task stops
/// when the writer is dropped.
pub struct CsvStatsWriter {
    registry: Registry,
    cancel: CancellationToken,
}

impl CsvStatsWriter {
    /// Creates the report file, writes the header and starts the reporting
    /// task
    pub async fn create(path: impl AsRef<Path>, interval: Duration) -> Result<Self> {
        let mut file = File::create(path.as_ref()).await.map_err(RelayError::Stats)?;
        file.write_all(b"timestamp_ms,socket_id,bytes_in,bytes_out\n")
            .await
            .map_err(RelayError::Stats)?;
        file.flush().await.map_err(RelayError::Stats)?;

        let registry: Registry = Arc::new(Mutex::new(HashMap::new()));
        let cancel = CancellationToken::new();
        tokio::spawn(report_loop(
            file,
            registry.clone(),
            interval,
            cancel.clone(),
        ));

        Ok(Self { registry, cancel })
    }
}

impl StatsCollector for CsvStatsWriter {
    fn add_socket(&self, socket: Arc<dyn SocketCapability>) {
        debug!(id = %socket.id(), "socket registered for stats");
        self.registry
            .lock()
            .expect("stats registry lock poisoned")
            .insert(socket.id(), socket);
    }

    fn remove_socket(&self, id: SocketId) {
        debug!(%id, "socket deregistered from stats");
        self.registry
            .lock()
            .expect("stats registry lock poisoned")
            .remove(&id);
    }
}

impl Drop for CsvStatsWriter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn report_loop(
    mut file: File,
    registry: Registry,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of an interval fires immediately; consume it so the
    // first report lands one period in.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Snapshot under the lock, write outside it.
        let snapshots: Vec<_> = registry
            .lock()
            .expect("stats registry lock poisoned")
            .iter()
            .map(|(id, socket)| (*id, socket.snapshot()))
            .collect();

        if snapshots.is_empty() {
            continue;
        }

        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let mut report = String::new();
        for (id, snapshot) in snapshots {
            let _ = writeln!(
                report,
                "{timestamp_ms},{id},{},{}",
                snapshot.bytes_in, snapshot.bytes_out
            );
        }

        if let Err(e) = file.write_all(report.as_bytes()).await {
            error!(error = %e, "failed to write stats report, stopping");
            break;
        }
        if let Err(e) = file.flush().await {
            error!(error = %e, "failed to flush stats report, stopping");
            break;
        }
    }
}
