//! Scheduler configuration.
//!
//! The core never reads files or the environment on its own; front ends
//! (such as the `strand` CLI) load a `SchedulerConfig` from TOML and hand it
//! to [`Scheduler::with_config`](crate::Scheduler::with_config).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which clock drives timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockKind {
    /// Real monotonic time
    #[default]
    System,
    /// Simulated time that jumps to the next timer
    Virtual,
}

/// How `run_until_complete` reacts to failed tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunPolicy {
    /// Run every task to a terminal state and return all results and errors
    #[default]
    CollectAll,
    /// Stop at the first failure and return an `AggregateError`
    FailFast,
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Threads in the blocking pool (0 = number of CPU cores)
    pub blocking_threads: usize,

    /// Clock driving timers
    pub clock: ClockKind,

    /// Default policy for `run_until_complete`
    pub policy: RunPolicy,

    /// Longest single wait for an external event, in milliseconds
    pub max_idle_wait_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            blocking_threads: 0,
            clock: ClockKind::System,
            policy: RunPolicy::CollectAll,
            max_idle_wait_ms: 50,
        }
    }
}

impl SchedulerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_idle_wait_ms == 0 {
            return Err(ConfigError::Invalid(
                "max-idle-wait-ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Blocking pool size with 0 resolved to the CPU count.
    pub fn resolved_blocking_threads(&self) -> usize {
        if self.blocking_threads == 0 {
            num_cpus::get()
        } else {
            self.blocking_threads
        }
    }

    /// Longest single wait for an external event.
    pub fn max_idle_wait(&self) -> Duration {
        Duration::from_millis(self.max_idle_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.clock, ClockKind::System);
        assert_eq!(config.policy, RunPolicy::CollectAll);
        assert_eq!(config.resolved_blocking_threads(), num_cpus::get());
        assert_eq!(config.max_idle_wait(), Duration::from_millis(50));
    }

    #[test]
    fn test_parse_partial() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            clock = "virtual"
            policy = "fail-fast"
            "#,
        )
        .unwrap();
        assert_eq!(config.clock, ClockKind::Virtual);
        assert_eq!(config.policy, RunPolicy::FailFast);
        assert_eq!(config.blocking_threads, 0);
    }

    #[test]
    fn test_parse_rejects_zero_wait() {
        let err = SchedulerConfig::from_toml_str("max-idle-wait-ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_clock() {
        let err = SchedulerConfig::from_toml_str("clock = \"sundial\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "blocking-threads = 3").unwrap();

        let config = SchedulerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.resolved_blocking_threads(), 3);
    }

    #[test]
    fn test_from_missing_file() {
        let err = SchedulerConfig::from_file("/nonexistent/strand.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
