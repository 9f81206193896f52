//! The reconnect supervisor
//!
//! Wraps connection acquisition and relay orchestration in a paced retry
//! loop. One iteration is a relay cycle: connect both sides, register them
//! with the stats collector, run the pumps until they end, deregister. A
//! failed or finished cycle re-enters pacing when reconnection is enabled;
//! otherwise its outcome is terminal.

use crate::config::RelayConfig;
use crate::connect::{ListenerHandle, acquire};
use crate::endpoint::Endpoint;
use crate::stats::StatsCollector;
use crate::{relay, Result};

use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Supervises relay cycles for one source/destination endpoint pair
///
/// # Examples
///
/// ```no_run
/// use relaysrv::{RelayConfig, Supervisor};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let src = vec!["tcp://0.0.0.0:4200?mode=listener".parse()?];
///     let dst = vec!["tcp://127.0.0.1:9000".parse()?];
///     let cfg = RelayConfig {
///         reconnect: true,
///         ..RelayConfig::default()
///     };
///
///     let cancel = CancellationToken::new();
///     let supervisor = Supervisor::new(src, dst, cfg);
///     supervisor.run(cancel).await?;
///     Ok(())
/// }
/// ```
pub struct Supervisor {
    src_endpoints: Vec<Endpoint>,
    dst_endpoints: Vec<Endpoint>,
    cfg: RelayConfig,
    stats: Option<Arc<dyn StatsCollector>>,
}

impl Supervisor {
    /// Creates a supervisor without stats reporting
    pub fn new(src_endpoints: Vec<Endpoint>, dst_endpoints: Vec<Endpoint>, cfg: RelayConfig) -> Self {
        Self {
            src_endpoints,
            dst_endpoints,
            cfg,
            stats: None,
        }
    }

    /// Attaches a stats collector whose hookpoints bracket every cycle
    pub fn with_stats(mut self, stats: Arc<dyn StatsCollector>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Runs relay cycles until cancelled, or until the single cycle ends
    /// when reconnection is disabled.
    ///
    /// With reconnection enabled, cycle failures are logged and absorbed;
    /// consecutive connection attempts are kept at least the pacing interval
    /// apart to bound the reconnect rate. With reconnection disabled the one
    /// cycle's outcome is returned as-is.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut src_listener: Option<ListenerHandle> = None;
        let mut dst_listener: Option<ListenerHandle> = None;
        let mut next_attempt = Instant::now();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_attempt) => {}
            }
            next_attempt = Instant::now() + self.cfg.pacing_interval;

            let outcome = self
                .cycle(&mut src_listener, &mut dst_listener, &cancel)
                .await;
            match &outcome {
                Ok(()) => info!("relay cycle finished"),
                Err(e) => error!(error = %e, "relay cycle failed"),
            }

            if !self.cfg.reconnect {
                return outcome;
            }
        }

        info!("supervisor stopped");
        Ok(())
    }

    async fn cycle(
        &self,
        src_listener: &mut Option<ListenerHandle>,
        dst_listener: &mut Option<ListenerHandle>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // Destination first: its listener must be ready before the source
        // side connects through it.
        let dst = acquire(&self.dst_endpoints, dst_listener).await?;
        let src = acquire(&self.src_endpoints, src_listener).await?;

        // A retained listener would keep accepting peers; only reconnecting
        // sessions get to keep one.
        if !self.cfg.reconnect {
            src_listener.take();
            dst_listener.take();
        }

        if let Some(stats) = &self.stats {
            stats.add_socket(src.clone());
            stats.add_socket(dst.clone());
        }

        let result = relay::run(src.clone(), dst.clone(), &self.cfg, cancel.clone()).await;

        if let Some(stats) = &self.stats {
            stats.remove_socket(src.id());
            stats.remove_socket(dst.id());
        }

        result
    }
}
