//! Connection acquisition against an ordered endpoint list
//!
//! Endpoints are attempted in list order until one yields an established
//! capability. A TCP listener bound for one cycle is stored in a
//! [`ListenerHandle`] so later reconnect cycles re-accept on the same port
//! instead of rebinding.

use crate::capability::{SocketCapability, TcpCapability, UdpCapability};
use crate::endpoint::{Endpoint, Mode, Scheme};
use crate::{RelayError, Result};

use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

/// Accept-capable handle kept across reconnect cycles
///
/// Owned by the reconnect supervisor and lent to [`acquire`] each cycle;
/// dropping it stops any further inbound connections.
#[derive(Clone)]
pub enum ListenerHandle {
    Tcp(Arc<TcpListener>),
}

impl ListenerHandle {
    /// Local address the listener is bound to
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        match self {
            ListenerHandle::Tcp(listener) => Ok(listener.local_addr()?),
        }
    }
}

/// Produces one connected capability from an ordered endpoint list.
///
/// Attempts endpoints in order and returns the first success. Fails with
/// [`RelayError::Connection`] once every endpoint has been tried. A listener
/// bound here is stored in `listener` for reuse; on an accept failure the
/// stored handle is cleared so the next attempt rebinds.
pub async fn acquire(
    endpoints: &[Endpoint],
    listener: &mut Option<ListenerHandle>,
) -> Result<Arc<dyn SocketCapability>> {
    if endpoints.is_empty() {
        return Err(RelayError::Connection("no endpoint was provided".into()));
    }

    let mut last_error = String::new();
    for endpoint in endpoints {
        match attempt(endpoint, listener).await {
            Ok(capability) => {
                info!(endpoint = %endpoint, id = %capability.id(), "connection established");
                return Ok(capability);
            }
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "connection attempt failed");
                last_error = e.to_string();
            }
        }
    }

    Err(RelayError::Connection(format!(
        "all {} endpoint(s) failed, last error: {last_error}",
        endpoints.len()
    )))
}

async fn attempt(
    endpoint: &Endpoint,
    listener: &mut Option<ListenerHandle>,
) -> Result<Arc<dyn SocketCapability>> {
    match (endpoint.scheme, endpoint.mode) {
        (Scheme::Tcp, Mode::Caller) => {
            let stream = TcpStream::connect(endpoint.addr).await?;
            Ok(Arc::new(TcpCapability::new(stream)?))
        }
        (Scheme::Tcp, Mode::Listener) => {
            let handle = match listener {
                Some(ListenerHandle::Tcp(handle)) => handle.clone(),
                None => {
                    let handle = Arc::new(TcpListener::bind(endpoint.addr).await?);
                    info!(addr = %handle.local_addr()?, "listener bound");
                    *listener = Some(ListenerHandle::Tcp(handle.clone()));
                    handle
                }
            };

            match handle.accept().await {
                Ok((stream, peer)) => {
                    info!(%peer, "accepted connection");
                    Ok(Arc::new(TcpCapability::new(stream)?))
                }
                Err(e) => {
                    // A listener that failed to accept is not trusted again.
                    listener.take();
                    Err(e.into())
                }
            }
        }
        (Scheme::Udp, Mode::Caller) => Ok(Arc::new(UdpCapability::caller(endpoint.addr).await?)),
        (Scheme::Udp, Mode::Listener) => {
            Ok(Arc::new(UdpCapability::listener(endpoint.addr).await?))
        }
    }
}
