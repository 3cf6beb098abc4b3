//! Decayed-weight skip-gram co-occurrence.
//!
//! For each key, every key in the trailing history contributes a pair whose
//! weight halves with distance: the previous key adds 1/2, the one before
//! that 1/4, and so on up to the history cap.

use crate::core::ngrams::KeyEvent;
use std::collections::{HashMap, VecDeque};

/// Default number of trailing keys that pair with each new key.
pub const DEFAULT_HISTORY_LEN: usize = 10;

/// Longest history a weigher keeps. Weights past this are below `f64`
/// resolution next to the nearer pairs.
pub const MAX_HISTORY_LEN: usize = 64;

/// Accumulated skip-gram weights keyed by pair name.
pub type SkipgramWeights = HashMap<String, f64>;

/// Computes skip-gram weights from a 1-gram batch.
#[derive(Debug, Clone)]
pub struct SkipgramWeigher {
    history_len: usize,
    /// `weights[d]` is the contribution of the key `d + 1` positions back.
    weights: Vec<f64>,
}

impl Default for SkipgramWeigher {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl SkipgramWeigher {
    /// Lengths above [`MAX_HISTORY_LEN`] are clamped to it.
    pub fn new(history_len: usize) -> Self {
        let history_len = history_len.min(MAX_HISTORY_LEN);
        let weights = (0..history_len)
            .map(|d| 0.5_f64.powi(d as i32 + 1))
            .collect();
        Self {
            history_len,
            weights,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Weigh every pair in `unigrams`, scanning in arrival order.
    ///
    /// History starts empty on every call.
    pub fn weigh(&self, unigrams: &[KeyEvent]) -> SkipgramWeights {
        let mut skipgrams = SkipgramWeights::new();
        // Most recent key at the front.
        let mut history: VecDeque<String> = VecDeque::with_capacity(self.history_len + 1);

        for event in unigrams {
            let key = event.name.to_string();

            for (earlier, weight) in history.iter().zip(&self.weights) {
                *skipgrams.entry(format!("{earlier}{key}")).or_insert(0.0) += weight;
            }

            history.push_front(key);
            history.truncate(self.history_len);
        }

        skipgrams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keymap::KeyName;
    use chrono::Utc;

    fn events(keys: &str) -> Vec<KeyEvent> {
        let now = Utc::now();
        keys.chars()
            .map(|c| KeyEvent::new(KeyName::Char(c), now))
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_three_key_weights() {
        let weights = SkipgramWeigher::default().weigh(&events("abc"));
        assert_eq!(weights.len(), 3);
        assert!(approx(weights["ab"], 0.5));
        assert!(approx(weights["bc"], 0.5));
        assert!(approx(weights["ac"], 0.25));
    }

    #[test]
    fn test_empty_and_single() {
        let weigher = SkipgramWeigher::default();
        assert!(weigher.weigh(&[]).is_empty());
        assert!(weigher.weigh(&events("a")).is_empty());
    }

    #[test]
    fn test_contributions_accumulate() {
        // "aa" at positions (0,1) and (1,2) at distance 1, plus (0,2) at distance 2.
        let weights = SkipgramWeigher::default().weigh(&events("aaa"));
        assert_eq!(weights.len(), 1);
        assert!(approx(weights["aa"], 0.5 + 0.5 + 0.25));
    }

    #[test]
    fn test_history_is_capped() {
        let keys = "abcdefghijkl";
        let weights = SkipgramWeigher::default().weigh(&events(keys));

        // The 12th key sees the 10 keys before it: 'k' down to 'b'.
        assert!(approx(weights["kl"], 0.5));
        assert!(approx(weights["cl"], 0.5_f64.powi(9)));
        assert!(approx(weights["bl"], 0.5_f64.powi(10)));
        assert!(!weights.contains_key("al"));
        // 'a' drops out of the history once 'l' arrives, never pairing past 10 back.
        assert!(approx(weights["ak"], 0.5_f64.powi(10)));
    }

    #[test]
    fn test_history_len_clamped() {
        let weigher = SkipgramWeigher::new(usize::MAX);
        assert_eq!(weigher.history_len(), MAX_HISTORY_LEN);
        let weights = weigher.weigh(&events("ab"));
        assert!(approx(weights["ab"], 0.5));
    }

    #[test]
    fn test_custom_history_len() {
        let weigher = SkipgramWeigher::new(1);
        assert_eq!(weigher.history_len(), 1);
        let weights = weigher.weigh(&events("abc"));
        assert!(!weights.contains_key("ac"));
        assert!(approx(weights["ab"], 0.5));
    }
}
