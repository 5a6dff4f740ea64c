//! Harness configuration

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a suite run.
///
/// Override individual fields with struct-update syntax:
///
/// ```
/// use lsfr_attest::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     command: "./scripts/run.sh".into(),
///     execute_timeout: Duration::from_secs(2),
///     ..Config::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Script/command that builds & runs the system under test
    pub command: PathBuf,

    /// Base directory for per-run artefacts (logs land under a
    /// timestamped `run-*` subdirectory)
    pub working_dir: PathBuf,

    /// How long a spawned process gets to accept TCP connections
    pub process_start_timeout: Duration,

    /// Grace period after SIGTERM before escalating to SIGKILL
    pub process_shutdown_timeout: Duration,

    /// Pause between stopping and re-spawning during a restart
    pub process_restart_delay: Duration,

    /// Default deadline for `eventually`/`consistently` operations
    pub default_retry_timeout: Duration,

    /// Spacing between retry attempts
    pub retry_poll_interval: Duration,

    /// Client-side deadline for a single HTTP request or CLI invocation
    pub execute_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: PathBuf::from("./run.sh"),
            working_dir: PathBuf::from(".lsfr"),
            process_start_timeout: Duration::from_secs(10),
            process_shutdown_timeout: Duration::from_secs(10),
            process_restart_delay: Duration::from_secs(1),
            default_retry_timeout: Duration::from_secs(5),
            retry_poll_interval: Duration::from_millis(100),
            execute_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.command, PathBuf::from("./run.sh"));
        assert_eq!(config.process_start_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_poll_interval, Duration::from_millis(100));
        assert_eq!(config.default_retry_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_struct_update_override() {
        let config = Config {
            execute_timeout: Duration::from_millis(50),
            ..Config::default()
        };
        assert_eq!(config.execute_timeout, Duration::from_millis(50));
        assert_eq!(config.process_shutdown_timeout, Duration::from_secs(10));
    }
}
