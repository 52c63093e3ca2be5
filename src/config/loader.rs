// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_COMMIT_QUEUE_CAPACITY, DEFAULT_EXTRACT_QUEUE_CAPACITY, DEFAULT_IDLE_POLL_INTERVAL_MS,
    DEFAULT_INGEST_QUEUE_CAPACITY, DEFAULT_MAX_CONCURRENT_WORKERS, DEFAULT_OUTPUT_QUEUE_CAPACITY,
    DEFAULT_POOL_CAPACITY,
};
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Sizing configuration for a [`Pipeline`](crate::engine::Pipeline).
///
/// Every field is optional in a configuration file and falls back to the
/// built-in default. All capacities must be positive.
///
/// # Fields
/// * `ingest_queue_capacity` - Records buffered between Ingestion and Extraction
/// * `commit_queue_capacity` - Records buffered between Ingestion and Commit
/// * `extract_queue_capacity` - Envelopes buffered between Extraction and Transformation
/// * `output_queue_capacity` - Envelopes buffered between Transformation and Output
/// * `max_concurrent_workers` - Permits shared by the Extraction, Transformation and Output workers
/// * `idle_poll_interval_ms` - Back-off after a poll that yielded nothing
/// * `pool_capacity` - Idle records and envelopes retained for reuse
///
/// # Example
/// ```yaml
/// ingest_queue_capacity: 500
/// commit_queue_capacity: 500
/// max_concurrent_workers: 64
/// idle_poll_interval_ms: 5
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ingest_queue_capacity: usize,
    pub commit_queue_capacity: usize,
    pub extract_queue_capacity: usize,
    pub output_queue_capacity: usize,
    pub max_concurrent_workers: usize,
    pub idle_poll_interval_ms: u64,
    pub pool_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ingest_queue_capacity: DEFAULT_INGEST_QUEUE_CAPACITY,
            commit_queue_capacity: DEFAULT_COMMIT_QUEUE_CAPACITY,
            extract_queue_capacity: DEFAULT_EXTRACT_QUEUE_CAPACITY,
            output_queue_capacity: DEFAULT_OUTPUT_QUEUE_CAPACITY,
            max_concurrent_workers: DEFAULT_MAX_CONCURRENT_WORKERS,
            idle_poll_interval_ms: DEFAULT_IDLE_POLL_INTERVAL_MS,
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn with_ingest_queue_capacity(mut self, capacity: usize) -> Self {
        self.ingest_queue_capacity = capacity;
        self
    }

    pub fn with_commit_queue_capacity(mut self, capacity: usize) -> Self {
        self.commit_queue_capacity = capacity;
        self
    }

    pub fn with_extract_queue_capacity(mut self, capacity: usize) -> Self {
        self.extract_queue_capacity = capacity;
        self
    }

    pub fn with_output_queue_capacity(mut self, capacity: usize) -> Self {
        self.output_queue_capacity = capacity;
        self
    }

    pub fn with_max_concurrent_workers(mut self, workers: usize) -> Self {
        self.max_concurrent_workers = workers;
        self
    }

    pub fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Back-off applied by Ingestion after an empty or failed poll.
    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    /// Reject any zero capacity.
    ///
    /// `pool_capacity` and `idle_poll_interval_ms` may be zero: a zero pool
    /// simply never retains idle objects and a zero interval re-polls
    /// immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("ingest_queue_capacity", self.ingest_queue_capacity),
            ("commit_queue_capacity", self.commit_queue_capacity),
            ("extract_queue_capacity", self.extract_queue_capacity),
            ("output_queue_capacity", self.output_queue_capacity),
            ("max_concurrent_workers", self.max_concurrent_workers),
        ];

        for (field, value) in capacities {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be a positive integer".to_string(),
                });
            }
        }

        // tokio's semaphore caps the number of permits it can hand out
        if self.max_concurrent_workers > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_workers",
                reason: format!(
                    "must not exceed {}",
                    tokio::sync::Semaphore::MAX_PERMITS
                ),
            });
        }

        Ok(())
    }
}

/// Parse a config from a YAML or TOML file without validating it.
///
/// Files ending in `.toml` are parsed as TOML, anything else as YAML. Use
/// [`load_and_validate_config`] unless the caller validates later.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let cfg = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    Ok(cfg)
}

/// Load and validate a config from a YAML or TOML file
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let cfg = load_config(path)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.ingest_queue_capacity, 1000);
        assert_eq!(cfg.commit_queue_capacity, 1000);
        assert_eq!(cfg.extract_queue_capacity, 1000);
        assert_eq!(cfg.output_queue_capacity, 1000);
        assert_eq!(cfg.max_concurrent_workers, 10_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_partial_yaml_keeps_defaults() {
        let yaml = r#"
commit_queue_capacity: 16
max_concurrent_workers: 4
"#;

        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.commit_queue_capacity, 16);
        assert_eq!(cfg.max_concurrent_workers, 4);
        assert_eq!(cfg.ingest_queue_capacity, DEFAULT_INGEST_QUEUE_CAPACITY);
        assert_eq!(cfg.pool_capacity, DEFAULT_POOL_CAPACITY);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let cfg = PipelineConfig::default().with_output_queue_capacity(0);
        match cfg.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "output_queue_capacity")
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn zero_pool_capacity_is_allowed() {
        let cfg = PipelineConfig::default().with_pool_capacity(0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builder_sets_idle_interval() {
        let cfg = PipelineConfig::default().with_idle_poll_interval(Duration::from_millis(250));
        assert_eq!(cfg.idle_poll_interval_ms, 250);
        assert_eq!(cfg.idle_poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "ingest_queue_capacity: 8\nextract_queue_capacity: 2").unwrap();

        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.ingest_queue_capacity, 8);
        assert_eq!(cfg.extract_queue_capacity, 2);
    }

    #[test]
    fn load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "output_queue_capacity = 3\nmax_concurrent_workers = 7").unwrap();

        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.output_queue_capacity, 3);
        assert_eq!(cfg.max_concurrent_workers, 7);
    }

    #[test]
    fn load_and_validate_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "max_concurrent_workers: 0").unwrap();

        let result = load_and_validate_config(file.path());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn load_config_skips_validation() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "max_concurrent_workers: 0").unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.max_concurrent_workers, 0);
        assert!(cfg.validate().is_err());
        assert!(load_and_validate_config(file.path()).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let result = load_config("/definitely/not/here.yaml");
        match result {
            Err(ConfigError::Io { path, .. }) => {
                assert_eq!(path, Path::new("/definitely/not/here.yaml"))
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
