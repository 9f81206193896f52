use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Transport scheme of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Stream relay over TCP
    Tcp,
    /// Datagram relay over UDP
    Udp,
}

/// Connection direction of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Actively connect (or target, for datagrams) the remote address
    #[default]
    Caller,
    /// Bind locally and wait for a peer
    Listener,
}

/// One candidate endpoint: scheme, address and connect-vs-listen mode
///
/// Parsed from strings like `tcp://127.0.0.1:9000` or
/// `udp://0.0.0.0:4200?mode=listener`.
///
/// # Examples
///
/// ```
/// use relaysrv::{Endpoint, Mode, Scheme};
///
/// let ep: Endpoint = "tcp://127.0.0.1:9000?mode=listener".parse().unwrap();
/// assert_eq!(ep.scheme, Scheme::Tcp);
/// assert_eq!(ep.mode, Mode::Listener);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub addr: SocketAddr,
    pub mode: Mode,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            Scheme::Tcp => "tcp",
            Scheme::Udp => "udp",
        };
        match self.mode {
            Mode::Caller => write!(f, "{scheme}://{}", self.addr),
            Mode::Listener => write!(f, "{scheme}://{}?mode=listener", self.addr),
        }
    }
}

impl FromStr for Endpoint {
    type Err = crate::RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |msg: String| crate::RelayError::Config(msg);

        let (scheme_str, rest) = s
            .split_once("://")
            .ok_or_else(|| err(format!("endpoint '{s}' is missing a scheme")))?;

        let scheme = match scheme_str {
            "tcp" => Scheme::Tcp,
            "udp" => Scheme::Udp,
            other => return Err(err(format!("unknown scheme '{other}' in endpoint '{s}'"))),
        };

        let (addr_str, query) = match rest.split_once('?') {
            Some((addr, query)) => (addr, Some(query)),
            None => (rest, None),
        };

        let addr = addr_str
            .parse::<SocketAddr>()
            .map_err(|e| err(format!("invalid address '{addr_str}': {e}")))?;

        let mut mode = Mode::Caller;
        for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some(("mode", "caller")) => mode = Mode::Caller,
                Some(("mode", "listener")) => mode = Mode::Listener,
                Some(("mode", other)) => {
                    return Err(err(format!("unknown mode '{other}' in endpoint '{s}'")));
                }
                _ => return Err(err(format!("unknown parameter '{pair}' in endpoint '{s}'"))),
            }
        }

        Ok(Endpoint { scheme, addr, mode })
    }
}
