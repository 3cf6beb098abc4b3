//! Configuration for the key logger.

use crate::core::session::SessionOptions;
use crate::core::skipgram::MAX_HISTORY_LEN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the key logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding all sessions
    pub db_path: PathBuf,

    /// Directory for corpus exports
    pub export_path: PathBuf,

    /// Directory for the transparency log
    pub data_path: PathBuf,

    /// Time between periodic flushes (in seconds)
    #[serde(with = "duration_serde")]
    pub flush_interval: Duration,

    /// Maximum gap between two keys for a bigram (in milliseconds)
    pub bigram_window_ms: u64,

    /// Maximum gap between a key and the one two back for a trigram (in milliseconds)
    pub trigram_window_ms: u64,

    /// Number of trailing keys that pair into skip-grams
    pub skipgram_history: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("key-logger");

        Self {
            db_path: data_dir.join("logger.db"),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            flush_interval: Duration::from_secs(60),
            bigram_window_ms: 1000,
            trigram_window_ms: 2000,
            skipgram_history: 10,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("key-logger")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)?;
        std::fs::create_dir_all(&self.data_path)?;
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Pipeline settings for a session run.
    ///
    /// Fails if a duration does not fit a signed time delta or the skip-gram
    /// history exceeds [`MAX_HISTORY_LEN`].
    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        if self.skipgram_history > MAX_HISTORY_LEN {
            return Err(ConfigError::OutOfRange {
                field: "skipgram_history",
                value: self.skipgram_history as u64,
            });
        }

        Ok(SessionOptions {
            flush_interval: delta("flush_interval", self.flush_interval.as_secs(), |v| {
                chrono::Duration::try_seconds(v)
            })?,
            bigram_window: delta("bigram_window_ms", self.bigram_window_ms, |v| {
                chrono::Duration::try_milliseconds(v)
            })?,
            trigram_window: delta("trigram_window_ms", self.trigram_window_ms, |v| {
                chrono::Duration::try_milliseconds(v)
            })?,
            skipgram_history: self.skipgram_history,
        })
    }
}

fn delta(
    field: &'static str,
    value: u64,
    convert: impl FnOnce(i64) -> Option<chrono::Duration>,
) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(value)
        .ok()
        .and_then(convert)
        .ok_or(ConfigError::OutOfRange { field, value })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: u64 },
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.flush_interval, Duration::from_secs(60));
        assert_eq!(config.bigram_window_ms, 1000);
        assert_eq!(config.trigram_window_ms, 2000);
        assert_eq!(config.skipgram_history, 10);
        assert!(config.db_path.ends_with("logger.db"));
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"flush_interval": 30}"#).unwrap();
        assert_eq!(config.flush_interval, Duration::from_secs(30));
        assert_eq!(config.skipgram_history, 10);
    }

    #[test]
    fn test_session_options() {
        let config = Config {
            bigram_window_ms: 750,
            ..Config::default()
        };
        let options = config.session_options().unwrap();
        assert_eq!(options.flush_interval, chrono::Duration::seconds(60));
        assert_eq!(options.bigram_window, chrono::Duration::milliseconds(750));
        assert_eq!(options.trigram_window, chrono::Duration::seconds(2));
    }

    fn out_of_range_field(config: Config) -> &'static str {
        match config.session_options() {
            Err(ConfigError::OutOfRange { field, .. }) => field,
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_flush_interval_out_of_range() {
        let wrapping = Config {
            flush_interval: Duration::from_secs(u64::MAX),
            ..Config::default()
        };
        assert_eq!(out_of_range_field(wrapping), "flush_interval");

        // Fits in i64 but not in a time delta.
        let too_long = Config {
            flush_interval: Duration::from_secs(100_000_000_000_000_000),
            ..Config::default()
        };
        assert_eq!(out_of_range_field(too_long), "flush_interval");
    }

    #[test]
    fn test_ngram_windows_out_of_range() {
        let bigram = Config {
            bigram_window_ms: u64::MAX,
            ..Config::default()
        };
        assert_eq!(out_of_range_field(bigram), "bigram_window_ms");

        let trigram = Config {
            trigram_window_ms: i64::MAX as u64 + 1,
            ..Config::default()
        };
        assert_eq!(out_of_range_field(trigram), "trigram_window_ms");
    }

    #[test]
    fn test_skipgram_history_capped() {
        let at_cap = Config {
            skipgram_history: MAX_HISTORY_LEN,
            ..Config::default()
        };
        assert_eq!(
            at_cap.session_options().unwrap().skipgram_history,
            MAX_HISTORY_LEN
        );

        let over = Config {
            skipgram_history: MAX_HISTORY_LEN + 1,
            ..Config::default()
        };
        assert_eq!(out_of_range_field(over), "skipgram_history");
    }

    #[test]
    fn test_large_windows_stay_positive() {
        let config = Config {
            flush_interval: Duration::from_secs(86_400 * 365),
            bigram_window_ms: 3_600_000,
            ..Config::default()
        };
        let options = config.session_options().unwrap();
        assert!(options.flush_interval > chrono::Duration::zero());
        assert_eq!(options.bigram_window, chrono::Duration::hours(1));
    }
}
