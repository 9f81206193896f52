//! Test doubles for exercising the relay engine without real sockets

use crate::capability::{SocketCapability, SocketId, StatsSnapshot};
use crate::{RelayError, Result};

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted outcome for a [`ScriptedCapability`] read call
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Deliver these bytes (truncated to the caller's buffer)
    Data(Vec<u8>),
    /// A zero-byte spurious wake
    Spurious,
    /// Fail with a fatal capability error of this kind
    Fail(io::ErrorKind),
}

/// Capability whose reads follow a script and whose writes are recorded
///
/// Once the script is exhausted, further reads block forever, which models a
/// quiet socket and lets tests drive cancellation. An optional per-write
/// byte cap simulates short writes.
pub struct ScriptedCapability {
    id: SocketId,
    reads: Mutex<VecDeque<ReadStep>>,
    writes: Mutex<Vec<Vec<u8>>>,
    write_cap: Option<usize>,
}

impl ScriptedCapability {
    pub fn new(script: Vec<ReadStep>) -> Arc<Self> {
        Arc::new(Self {
            id: SocketId::next(),
            reads: Mutex::new(script.into()),
            writes: Mutex::new(Vec::new()),
            write_cap: None,
        })
    }

    /// Like [`new`](Self::new), but every write accepts at most `cap` bytes
    pub fn with_write_cap(script: Vec<ReadStep>, cap: usize) -> Arc<Self> {
        Arc::new(Self {
            id: SocketId::next(),
            reads: Mutex::new(script.into()),
            writes: Mutex::new(Vec::new()),
            write_cap: Some(cap),
        })
    }

    /// Bytes accepted by each write call, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().expect("writes lock poisoned").clone()
    }

    /// Number of script steps not yet consumed
    pub fn remaining_reads(&self) -> usize {
        self.reads.lock().expect("script lock poisoned").len()
    }
}

#[async_trait]
impl SocketCapability for ScriptedCapability {
    fn id(&self) -> SocketId {
        self.id
    }

    async fn read(&self, buf: &mut [u8], _timeout: Option<Duration>) -> Result<usize> {
        let step = self
            .reads
            .lock()
            .expect("script lock poisoned")
            .pop_front();

        match step {
            Some(ReadStep::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Some(ReadStep::Spurious) => Ok(0),
            Some(ReadStep::Fail(kind)) => Err(RelayError::Capability(io::Error::new(
                kind,
                "scripted capability failure",
            ))),
            None => {
                std::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            }
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        let n = match self.write_cap {
            Some(cap) => buf.len().min(cap),
            None => buf.len(),
        };
        self.writes
            .lock()
            .expect("writes lock poisoned")
            .push(buf[..n].to_vec());
        Ok(n)
    }

    fn snapshot(&self) -> StatsSnapshot {
        let bytes_out = self
            .writes
            .lock()
            .expect("writes lock poisoned")
            .iter()
            .map(|w| w.len() as u64)
            .sum();
        StatsSnapshot {
            bytes_in: 0,
            bytes_out,
        }
    }
}
