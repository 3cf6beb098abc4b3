//! Transparency log of what the logger has recorded.
//!
//! Tracks how many keys were logged or discarded and how flushes went,
//! without holding any key content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current run, optionally carried over from earlier runs.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Keys that reached the n-gram pipeline
    keys_logged: AtomicU64,
    /// Key presses dropped by normalization
    keys_discarded: AtomicU64,
    flushes_completed: AtomicU64,
    flushes_failed: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            keys_logged: AtomicU64::new(0),
            keys_discarded: AtomicU64::new(0),
            flushes_completed: AtomicU64::new(0),
            flushes_failed: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that loads and saves cumulative counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_key_logged(&self) {
        self.keys_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_key_discarded(&self) {
        self.keys_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_completed(&self) {
        self.flushes_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush_failed(&self) {
        self.flushes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            keys_logged: self.keys_logged.load(Ordering::Relaxed),
            keys_discarded: self.keys_discarded.load(Ordering::Relaxed),
            flushes_completed: self.flushes_completed.load(Ordering::Relaxed),
            flushes_failed: self.flushes_failed.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Keys logged: {}\n\
             - Keys discarded: {}\n\
             - Flushes completed: {}\n\
             - Flushes failed: {}\n\
             - Session duration: {} seconds",
            stats.keys_logged,
            stats.keys_discarded,
            stats.flushes_completed,
            stats.flushes_failed,
            stats.session_duration_secs
        )
    }

    /// Save counters to disk, if this log is persistent.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                keys_logged: stats.keys_logged,
                keys_discarded: stats.keys_discarded,
                flushes_completed: stats.flushes_completed,
                flushes_failed: stats.flushes_failed,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.keys_logged
                    .store(persisted.keys_logged, Ordering::Relaxed);
                self.keys_discarded
                    .store(persisted.keys_discarded, Ordering::Relaxed);
                self.flushes_completed
                    .store(persisted.flushes_completed, Ordering::Relaxed);
                self.flushes_failed
                    .store(persisted.flushes_failed, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub keys_logged: u64,
    pub keys_discarded: u64,
    pub flushes_completed: u64,
    pub flushes_failed: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    keys_logged: u64,
    keys_discarded: u64,
    flushes_completed: u64,
    flushes_failed: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
