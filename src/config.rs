//! Worker pool configuration.
//!
//! A config can be built in code or loaded from TOML:
//!
//! ```toml
//! threads = 4
//! queue_capacity = 1024
//! thread_name = "stats-worker"
//! ```
//!
//! Missing keys fall back to [`PoolConfig::default`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Prefix for worker thread names; workers are named `{prefix}-{index}`.
pub const DEFAULT_THREAD_NAME: &str = "parmap-worker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads. Must be positive.
    pub threads: usize,
    /// Bound on queued tasks; `None` means unbounded.
    pub queue_capacity: Option<usize>,
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            threads: num_cpus::get(),
            queue_capacity: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl PoolConfig {
    /// Default config with the given thread count.
    pub fn new(threads: usize) -> Self {
        PoolConfig {
            threads,
            ..PoolConfig::default()
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreads(self.threads));
        }
        if let Some(capacity) = self.queue_capacity {
            if capacity == 0 {
                return Err(ConfigError::InvalidCapacity(capacity));
            }
        }
        Ok(())
    }
}

/// Checks a driver step value.
pub(crate) fn validate_step(step: usize) -> Result<(), ConfigError> {
    if step == 0 {
        Err(ConfigError::InvalidStep(step))
    } else {
        Ok(())
    }
}

/// Checks a thread count passed per call.
pub(crate) fn validate_threads(threads: usize) -> Result<(), ConfigError> {
    if threads == 0 {
        Err(ConfigError::InvalidThreads(threads))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_uses_all_cores() {
        let config = PoolConfig::default();
        assert_eq!(config.threads, num_cpus::get());
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = PoolConfig::new(3)
            .with_queue_capacity(16)
            .with_thread_name("stats");
        assert_eq!(config.threads, 3);
        assert_eq!(config.queue_capacity, Some(16));
        assert_eq!(config.thread_name, "stats");
    }

    #[test]
    fn parse_partial_toml() {
        let config = PoolConfig::from_toml_str("threads = 2").unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn parse_full_toml() {
        let input = r#"
            threads = 4
            queue_capacity = 128
            thread_name = "crawler"
        "#;
        let config = PoolConfig::from_toml_str(input).unwrap();
        assert_eq!(config, PoolConfig::new(4).with_queue_capacity(128).with_thread_name("crawler"));
    }

    #[test]
    fn rejects_zero_threads() {
        let err = PoolConfig::from_toml_str("threads = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThreads(0)));
    }

    #[test]
    fn rejects_zero_capacity() {
        let err = PoolConfig::new(1).with_queue_capacity(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCapacity(0)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = PoolConfig::from_toml_str("threads = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads = 6").unwrap();
        writeln!(file, "thread_name = \"from-file\"").unwrap();

        let config = PoolConfig::load(file.path()).unwrap();
        assert_eq!(config.threads, 6);
        assert_eq!(config.thread_name, "from-file");
    }

    #[test]
    fn load_missing_file() {
        let err = PoolConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn step_and_threads_checks() {
        assert!(validate_step(1).is_ok());
        assert!(matches!(validate_step(0), Err(ConfigError::InvalidStep(0))));
        assert!(validate_threads(5).is_ok());
        assert!(matches!(validate_threads(0), Err(ConfigError::InvalidThreads(0))));
    }
}
