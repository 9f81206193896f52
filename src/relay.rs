//! The relay orchestrator
//!
//! Wires up one or two pumps over a pair of capabilities and owns their
//! concurrent execution. The forward pump runs on the calling task; the
//! reverse pump, when bidirectional mode is on, runs on a spawned task and
//! is always joined before this call returns.

use crate::capability::SocketCapability;
use crate::config::RelayConfig;
use crate::pump::{Direction, pump};
use crate::Result;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs one relay cycle's pumps over an established pair of capabilities.
///
/// Returns only after both directions have terminated. A fatal error in one
/// direction does not cancel the sibling pump; each direction ends on its
/// own error or on shared cancellation, and the forward direction's error is
/// reported first when both failed.
pub async fn run(
    src: Arc<dyn SocketCapability>,
    dst: Arc<dyn SocketCapability>,
    cfg: &RelayConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let backward = cfg.bidirectional.then(|| {
        tokio::spawn(pump(
            dst.clone(),
            src.clone(),
            cfg.message_size,
            Direction::Backward,
            cancel.clone(),
        ))
    });

    let forward = pump(src, dst, cfg.message_size, Direction::Forward, cancel).await;

    let backward = match backward {
        Some(handle) => handle.await?,
        None => Ok(()),
    };

    debug!("both relay directions terminated");
    forward.and(backward)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelayError;
    use crate::testing::{ReadStep, ScriptedCapability};
    use std::io;
    use std::time::Duration;
    use tokio::time::timeout;

    fn config(bidirectional: bool) -> RelayConfig {
        RelayConfig {
            message_size: 1024,
            bidirectional,
            ..RelayConfig::default()
        }
    }

    #[tokio::test]
    async fn unidirectional_never_reads_the_destination() {
        let src = ScriptedCapability::new(vec![
            ReadStep::Data(b"payload".to_vec()),
            ReadStep::Fail(io::ErrorKind::BrokenPipe),
        ]);
        // Any read from dst would consume this step; it must stay untouched.
        let dst = ScriptedCapability::new(vec![ReadStep::Data(b"reverse".to_vec())]);

        let result = run(
            src.clone(),
            dst.clone(),
            &config(false),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(dst.writes(), vec![b"payload".to_vec()]);
        assert_eq!(src.writes().len(), 0);
        assert_eq!(dst.remaining_reads(), 1);
    }

    #[tokio::test]
    async fn bidirectional_pumps_both_directions() {
        let src = ScriptedCapability::new(vec![
            ReadStep::Data(b"forward".to_vec()),
            ReadStep::Fail(io::ErrorKind::BrokenPipe),
        ]);
        let dst = ScriptedCapability::new(vec![
            ReadStep::Data(b"reverse".to_vec()),
            ReadStep::Fail(io::ErrorKind::BrokenPipe),
        ]);

        let result = run(
            src.clone(),
            dst.clone(),
            &config(true),
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(dst.writes(), vec![b"forward".to_vec()]);
        assert_eq!(src.writes(), vec![b"reverse".to_vec()]);
    }

    // Pins the preserved design choice: one direction's fatal error leaves
    // the sibling pump running until its own script ends.
    #[tokio::test]
    async fn one_sided_error_does_not_stop_reverse_pump() {
        let src = ScriptedCapability::new(vec![ReadStep::Fail(io::ErrorKind::ConnectionReset)]);
        let dst = ScriptedCapability::new(vec![
            ReadStep::Data(b"one".to_vec()),
            ReadStep::Data(b"two".to_vec()),
            ReadStep::Data(b"three".to_vec()),
            ReadStep::Fail(io::ErrorKind::BrokenPipe),
        ]);

        let result = timeout(
            Duration::from_secs(1),
            run(
                src.clone(),
                dst.clone(),
                &config(true),
                CancellationToken::new(),
            ),
        )
        .await
        .expect("run returns once both directions ended");

        // Forward failed first and its error is the one reported; the
        // reverse direction still delivered its whole script.
        assert!(matches!(result, Err(RelayError::Capability(_))));
        assert_eq!(
            src.writes(),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
    }

    #[tokio::test]
    async fn cancellation_terminates_both_directions() {
        // Both scripts empty: both pumps block in their reads immediately.
        let src = ScriptedCapability::new(vec![]);
        let dst = ScriptedCapability::new(vec![]);
        let cancel = CancellationToken::new();

        let run_task = tokio::spawn({
            let cancel = cancel.clone();
            let (src, dst) = (src.clone(), dst.clone());
            async move { run(src, dst, &config(true), cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = timeout(Duration::from_secs(1), run_task)
            .await
            .expect("orchestrator exits promptly after cancellation")
            .unwrap();
        assert!(result.is_ok());
    }
}
