use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one relay instance
///
/// Immutable once built; every component reads it, none mutates it.
///
/// # Examples
///
/// ```
/// use relaysrv::RelayConfig;
/// use std::time::Duration;
///
/// let config = RelayConfig {
///     message_size: 1316,
///     bidirectional: true,
///     reconnect: true,
///     pacing_interval: Duration::from_secs(1),
///     stats_file: None,
///     stats_interval: None,
/// };
/// assert!(!config.stats_enabled());
/// ```
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Buffer size for a single read/write cycle, in bytes
    pub message_size: usize,
    /// Run a second pump for the reverse direction
    pub bidirectional: bool,
    /// Re-enter the connect loop after a relay cycle ends
    pub reconnect: bool,
    /// Minimum wait between successive connection attempts
    pub pacing_interval: Duration,
    /// Stats report filename; stats are written only when both this and
    /// `stats_interval` are set
    pub stats_file: Option<PathBuf>,
    /// Stats report frequency
    pub stats_interval: Option<Duration>,
}

impl RelayConfig {
    /// True when both a non-empty stats file and a positive interval are set
    pub fn stats_enabled(&self) -> bool {
        let file_set = self
            .stats_file
            .as_ref()
            .is_some_and(|p| !p.as_os_str().is_empty());
        let interval_set = self.stats_interval.is_some_and(|d| d > Duration::ZERO);
        file_set && interval_set
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            message_size: 1456,
            bidirectional: false,
            reconnect: false,
            pacing_interval: Duration::from_secs(1),
            stats_file: None,
            stats_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = RelayConfig::default();
        assert_eq!(config.message_size, 1456);
        assert!(!config.bidirectional);
        assert!(!config.reconnect);
        assert_eq!(config.pacing_interval, Duration::from_secs(1));
        assert!(!config.stats_enabled());
    }

    #[test]
    fn stats_require_both_file_and_interval() {
        let mut config = RelayConfig {
            stats_file: Some(PathBuf::from("stats.csv")),
            ..RelayConfig::default()
        };
        assert!(!config.stats_enabled());

        config.stats_interval = Some(Duration::from_millis(100));
        assert!(config.stats_enabled());

        config.stats_file = Some(PathBuf::new());
        assert!(!config.stats_enabled());

        config.stats_file = Some(PathBuf::from("stats.csv"));
        config.stats_interval = Some(Duration::ZERO);
        assert!(!config.stats_enabled());
    }
}
