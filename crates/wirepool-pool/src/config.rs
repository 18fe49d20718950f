use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{PoolError, Result};

/// Default wait between shutdown checks for idle workers and result drains.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Controls pool sizing and queue behavior.
///
/// Deserializes from JSON; the legacy key names `JobsResultsQueueNum` and
/// `MaxWorkerSize` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of (job queue, result queue) pairs. Fixed for the pool's lifetime.
    #[serde(alias = "JobsResultsQueueNum")]
    pub queue_pairs: usize,
    /// Number of worker threads spawned by `start()`.
    #[serde(alias = "MaxWorkerSize")]
    pub max_workers: usize,
    /// Per-queue capacity. `None` means unbounded.
    pub queue_capacity: Option<usize>,
    /// How long idle waits block before re-checking the shutdown signal.
    #[serde(rename = "poll_interval_ms", deserialize_with = "deserialize_millis")]
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            queue_pairs: parallelism,
            max_workers: parallelism,
            queue_capacity: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PoolConfig {
    /// Load a config from a JSON file. Missing keys take default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PoolError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| PoolError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queue_pairs == 0 {
            return Err(PoolError::InvalidConfig(
                "queue_pairs must be at least 1".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(PoolError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(PoolError::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn deserialize_millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_keys() {
        let config: PoolConfig = serde_json::from_str(
            r#"{"queue_pairs": 3, "max_workers": 8, "queue_capacity": 64, "poll_interval_ms": 25}"#,
        )
        .unwrap();

        assert_eq!(config.queue_pairs, 3);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.queue_capacity, Some(64));
        assert_eq!(config.poll_interval, Duration::from_millis(25));
    }

    #[test]
    fn accepts_legacy_key_names() {
        let config: PoolConfig =
            serde_json::from_str(r#"{"JobsResultsQueueNum": 2, "MaxWorkerSize": 5}"#).unwrap();

        assert_eq!(config.queue_pairs, 2);
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.queue_capacity, None);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = serde_json::from_str::<PoolConfig>(r#"{"workers": 2}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn validate_rejects_zero_counts() {
        let zero_pairs = PoolConfig {
            queue_pairs: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            zero_pairs.validate(),
            Err(PoolError::InvalidConfig(_))
        ));

        let zero_workers = PoolConfig {
            max_workers: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            zero_workers.validate(),
            Err(PoolError::InvalidConfig(_))
        ));

        let zero_poll = PoolConfig {
            poll_interval: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(zero_poll.validate().is_err());
    }

    #[test]
    fn default_is_valid() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn loads_from_file() {
        let dir = std::env::temp_dir().join(format!(
            "wirepool-config-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pool.json");
        std::fs::write(&path, r#"{"MaxWorkerSize": 4, "JobsResultsQueueNum": 2}"#).unwrap();

        let config = PoolConfig::from_json_file(&path).unwrap();
        assert_eq!((config.queue_pairs, config.max_workers), (2, 4));

        std::fs::write(&path, r#"{"MaxWorkerSize": 0}"#).unwrap();
        assert!(matches!(
            PoolConfig::from_json_file(&path),
            Err(PoolError::InvalidConfig(_))
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            PoolConfig::from_json_file(&path),
            Err(PoolError::ConfigParse { .. })
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = PoolConfig::from_json_file("/nonexistent/wirepool/pool.json").unwrap_err();
        assert!(matches!(err, PoolError::ConfigRead { .. }));
    }
}
