//! Time-gated n-gram extraction from the key event stream.
//!
//! Every key event becomes a 1-gram. A 2-gram is recorded when the previous
//! key was pressed within the bigram window, and a 3-gram when the key two
//! positions back was pressed within the trigram window. Both gates are
//! inclusive.

use crate::core::keymap::KeyName;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default gate between a key and the one before it.
pub const DEFAULT_BIGRAM_WINDOW_MS: i64 = 1000;

/// Default gate between a key and the one two positions before it.
pub const DEFAULT_TRIGRAM_WINDOW_MS: i64 = 2000;

/// A normalized key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub name: KeyName,
    pub timestamp: DateTime<Utc>,
}

impl KeyEvent {
    pub fn new(name: KeyName, timestamp: DateTime<Utc>) -> Self {
        Self { name, timestamp }
    }
}

/// A 2-gram or 3-gram occurrence, stamped with the time of its last key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NGramRecord {
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

/// The n-gram occurrences accumulated since the last flush.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NGramBatch {
    pub unigrams: Vec<KeyEvent>,
    pub bigrams: Vec<NGramRecord>,
    pub trigrams: Vec<NGramRecord>,
}

impl NGramBatch {
    pub fn is_empty(&self) -> bool {
        self.unigrams.is_empty() && self.bigrams.is_empty() && self.trigrams.is_empty()
    }

    pub fn clear(&mut self) {
        self.unigrams.clear();
        self.bigrams.clear();
        self.trigrams.clear();
    }
}

/// Turns key events into 1/2/3-gram occurrences.
#[derive(Debug)]
pub struct NGramExtractor {
    bigram_window: Duration,
    trigram_window: Duration,
    batch: NGramBatch,
}

impl Default for NGramExtractor {
    fn default() -> Self {
        Self::new(
            Duration::milliseconds(DEFAULT_BIGRAM_WINDOW_MS),
            Duration::milliseconds(DEFAULT_TRIGRAM_WINDOW_MS),
        )
    }
}

impl NGramExtractor {
    pub fn new(bigram_window: Duration, trigram_window: Duration) -> Self {
        Self {
            bigram_window,
            trigram_window,
            batch: NGramBatch::default(),
        }
    }

    /// Process one key event.
    ///
    /// Gates are checked against the events already in the batch, so the
    /// first keys after a flush never form multi-grams with keys from the
    /// previous batch.
    pub fn observe(&mut self, event: KeyEvent) -> &NGramBatch {
        let history = &self.batch.unigrams;
        let len = history.len();

        if len >= 1 {
            let prev = &history[len - 1];
            if event.timestamp - prev.timestamp <= self.bigram_window {
                let name = format!("{}{}", prev.name, event.name);
                self.batch.bigrams.push(NGramRecord {
                    name,
                    timestamp: event.timestamp,
                });
            }
        }

        if len >= 2 {
            let prev = &history[len - 1];
            let prev_prev = &history[len - 2];
            if event.timestamp - prev_prev.timestamp <= self.trigram_window {
                let name = format!("{}{}{}", prev_prev.name, prev.name, event.name);
                self.batch.trigrams.push(NGramRecord {
                    name,
                    timestamp: event.timestamp,
                });
            }
        }

        self.batch.unigrams.push(event);
        &self.batch
    }

    pub fn batch(&self) -> &NGramBatch {
        &self.batch
    }

    /// Drop everything accumulated so far.
    pub fn clear(&mut self) {
        self.batch.clear();
    }
}
