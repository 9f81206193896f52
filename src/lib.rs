use thiserror::Error;

/// Error types for the relaysrv library
#[derive(Error, Debug)]
pub enum RelayError {
    /// No endpoint in a candidate list could be connected
    #[error("connection error: {0}")]
    Connection(String),

    /// Fatal error on an established socket (closed, reset, broken pipe)
    #[error("capability error: {0}")]
    Capability(#[from] std::io::Error),

    /// Configuration errors (invalid endpoint strings, bad sizes)
    #[error("configuration error: {0}")]
    Config(String),

    /// Stats report file errors (create, write, flush)
    #[error("stats error: {0}")]
    Stats(std::io::Error),

    /// A background pump task panicked or was aborted
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for the relaysrv library
pub type Result<T> = std::result::Result<T, RelayError>;

pub mod capability;
pub mod config;
pub mod connect;
pub mod endpoint;
pub mod pump;
pub mod relay;
pub mod stats;
pub mod supervisor;
pub mod testing;

// Re-export main types for convenience
pub use capability::{SocketCapability, SocketId, StatsSnapshot};
pub use config::RelayConfig;
pub use connect::{ListenerHandle, acquire};
pub use endpoint::{Endpoint, Mode, Scheme};
pub use pump::{Direction, pump};
pub use stats::{CsvStatsWriter, StatsCollector};
pub use supervisor::Supervisor;
