//! The unidirectional data pump
//!
//! Drains one capability into another until cancelled or a fatal socket
//! error ends the relay attempt. Transient anomalies are absorbed here:
//! a zero-byte read is retried in place and a short write drops the unsent
//! remainder. The remainder is not buffered or re-sent; the relay is lossy
//! on short writes by design.

use crate::capability::SocketCapability;
use crate::Result;

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Direction of one pump, carried as log context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "src->dst"),
            Direction::Backward => write!(f, "dst->src"),
        }
    }
}

/// Copies bytes from `src` to `dst` until `cancel` fires or a capability
/// fails.
///
/// Every iteration blocks in the read with no timeout; cancellation wakes
/// the pending read, so the loop never spins without I/O readiness. Errors
/// from either capability propagate out and end this relay attempt.
pub async fn pump(
    src: Arc<dyn SocketCapability>,
    dst: Arc<dyn SocketCapability>,
    buffer_size: usize,
    direction: Direction,
    cancel: CancellationToken,
) -> Result<()> {
    let mut buffer = vec![0u8; buffer_size];

    info!(%direction, "pump started");

    loop {
        let bytes_read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = src.read(&mut buffer, None) => read?,
        };

        if bytes_read == 0 {
            info!(%direction, "read 0 bytes on a socket (spurious read-ready?), retrying");
            continue;
        }

        let bytes_written = dst.write(&buffer[..bytes_read]).await?;

        if bytes_written != bytes_read {
            info!(
                %direction,
                written = bytes_written,
                expected = bytes_read,
                "short write, dropping the unsent remainder"
            );
            continue;
        }
    }

    info!(%direction, "pump stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelayError;
    use crate::testing::{ReadStep, ScriptedCapability};
    use std::io;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn spurious_reads_never_produce_writes() {
        // Reads of [0, 0, 500] on a 1024-byte buffer: two retries, then one
        // write of exactly 500 bytes.
        let src = ScriptedCapability::new(vec![
            ReadStep::Spurious,
            ReadStep::Spurious,
            ReadStep::Data(vec![0xAB; 500]),
            ReadStep::Fail(io::ErrorKind::BrokenPipe),
        ]);
        let dst = ScriptedCapability::new(vec![]);

        let result = pump(
            src.clone(),
            dst.clone(),
            1024,
            Direction::Forward,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(RelayError::Capability(_))));
        let writes = dst.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], vec![0xAB; 500]);
    }

    #[tokio::test]
    async fn short_write_drops_the_remainder() {
        let src = ScriptedCapability::new(vec![
            ReadStep::Data(vec![1; 300]),
            ReadStep::Data(vec![2; 300]),
            ReadStep::Fail(io::ErrorKind::BrokenPipe),
        ]);
        let dst = ScriptedCapability::with_write_cap(vec![], 200);

        let result = pump(
            src,
            dst.clone(),
            1024,
            Direction::Forward,
            CancellationToken::new(),
        )
        .await;

        // The pump keeps going after each short write; only the scripted
        // failure ends it. Nothing beyond the accepted prefix is re-sent.
        assert!(result.is_err());
        let writes = dst.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], vec![1; 200]);
        assert_eq!(writes[1], vec![2; 200]);
    }

    #[tokio::test]
    async fn read_error_propagates() {
        let src = ScriptedCapability::new(vec![ReadStep::Fail(io::ErrorKind::ConnectionReset)]);
        let dst = ScriptedCapability::new(vec![]);

        let result = pump(src, dst, 64, Direction::Forward, CancellationToken::new()).await;
        assert!(matches!(result, Err(RelayError::Capability(_))));
    }

    #[tokio::test]
    async fn cancellation_wakes_a_pending_read() {
        // Empty script: the next read blocks forever until cancelled.
        let src = ScriptedCapability::new(vec![]);
        let dst = ScriptedCapability::new(vec![]);
        let cancel = CancellationToken::new();

        let pump_task = tokio::spawn(pump(src, dst, 64, Direction::Forward, cancel.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = timeout(Duration::from_secs(1), pump_task)
            .await
            .expect("pump exits promptly after cancellation")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn buffer_bounds_a_single_read() {
        let src = ScriptedCapability::new(vec![
            ReadStep::Data(vec![7; 1000]),
            ReadStep::Fail(io::ErrorKind::BrokenPipe),
        ]);
        let dst = ScriptedCapability::new(vec![]);

        let _ = pump(src, dst.clone(), 256, Direction::Forward, CancellationToken::new()).await;

        let writes = dst.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0], vec![7; 256]);
    }
}
