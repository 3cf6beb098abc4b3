//! Merging in-memory batches into the session store.
//!
//! N-gram occurrences are written one at a time: each occurrence looks up
//! its `(name, session)` row and either inserts it with a frequency of one or
//! increments it. Skip-gram weights are summed per pair first and applied
//! once per distinct pair.

use crate::core::ngrams::{NGramBatch, NGramExtractor};
use crate::core::skipgram::SkipgramWeigher;
use crate::store::{SessionStore, StatKind, StatValue, StoreError};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Default time between periodic flushes.
pub const DEFAULT_FLUSH_INTERVAL_SECS: i64 = 60;

/// What a single flush wrote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushReport {
    pub unigrams: usize,
    pub bigrams: usize,
    pub trigrams: usize,
    pub skipgrams: usize,
    /// Rows that did not exist before this flush
    pub rows_created: usize,
}

impl FlushReport {
    pub fn writes(&self) -> usize {
        self.unigrams + self.bigrams + self.trigrams + self.skipgrams
    }
}

/// Decides when the next periodic flush is due, from event time.
#[derive(Debug, Clone)]
pub struct FlushSchedule {
    interval: Duration,
    last_flush: DateTime<Utc>,
}

impl FlushSchedule {
    pub fn new(interval: Duration, started_at: DateTime<Utc>) -> Self {
        Self {
            interval,
            last_flush: started_at,
        }
    }

    /// True once `now` is at least one interval past the last flush.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_flush >= self.interval
    }

    pub fn mark_flushed(&mut self, at: DateTime<Utc>) {
        self.last_flush = at;
    }

    pub fn last_flush(&self) -> DateTime<Utc> {
        self.last_flush
    }
}

/// Writes n-gram and skip-gram batches into a [`SessionStore`].
#[derive(Debug, Clone, Default)]
pub struct AggregateFlusher {
    weigher: SkipgramWeigher,
}

impl AggregateFlusher {
    pub fn new(weigher: SkipgramWeigher) -> Self {
        Self { weigher }
    }

    /// Flush the extractor's batch into `store` and clear it.
    ///
    /// The batch is cleared whether or not the writes succeed; rows written
    /// before a failure stay written.
    pub fn flush<S>(
        &self,
        store: &S,
        session: &str,
        extractor: &mut NGramExtractor,
    ) -> Result<FlushReport, StoreError>
    where
        S: SessionStore + ?Sized,
    {
        let result = self.write_batch(store, session, extractor.batch());
        extractor.clear();
        result
    }

    /// Write a batch without touching any in-memory state.
    pub fn write_batch<S>(
        &self,
        store: &S,
        session: &str,
        batch: &NGramBatch,
    ) -> Result<FlushReport, StoreError>
    where
        S: SessionStore + ?Sized,
    {
        let mut report = FlushReport::default();
        let one = StatValue::Freq(1);

        for event in &batch.unigrams {
            let name = event.name.to_string();
            report.rows_created += bump(store, StatKind::Unigrams, &name, session, one)? as usize;
            report.unigrams += 1;
        }
        for record in &batch.bigrams {
            report.rows_created +=
                bump(store, StatKind::Bigrams, &record.name, session, one)? as usize;
            report.bigrams += 1;
        }
        for record in &batch.trigrams {
            report.rows_created +=
                bump(store, StatKind::Trigrams, &record.name, session, one)? as usize;
            report.trigrams += 1;
        }

        let mut skipgrams: Vec<(String, f64)> =
            self.weigher.weigh(&batch.unigrams).into_iter().collect();
        // Stable write order keeps row ids reproducible.
        skipgrams.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, weight) in &skipgrams {
            report.rows_created += bump(
                store,
                StatKind::Skipgrams,
                name,
                session,
                StatValue::Weight(*weight),
            )? as usize;
            report.skipgrams += 1;
        }

        tracing::debug!(
            session,
            unigrams = report.unigrams,
            bigrams = report.bigrams,
            trigrams = report.trigrams,
            skipgrams = report.skipgrams,
            rows_created = report.rows_created,
            "Batch written"
        );
        Ok(report)
    }
}

/// Read-then-write one value into its `(name, session)` row.
///
/// Returns true when a new row was created.
fn bump<S>(
    store: &S,
    kind: StatKind,
    name: &str,
    session: &str,
    delta: StatValue,
) -> Result<bool, StoreError>
where
    S: SessionStore + ?Sized,
{
    match store.find_row(kind, name, session)? {
        Some(id) => {
            store.add_to_row(kind, id, delta)?;
            Ok(false)
        }
        None => {
            store.insert_row(kind, name, delta, session)?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keymap::KeyName;
    use crate::core::ngrams::KeyEvent;
    use crate::store::{SqliteStore, StatQuery, StatTable};
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn extractor_with(keys: &str, step_ms: i64) -> NGramExtractor {
        let mut extractor = NGramExtractor::default();
        for (i, c) in keys.chars().enumerate() {
            extractor.observe(KeyEvent::new(
                KeyName::Char(c),
                base() + Duration::milliseconds(step_ms * i as i64),
            ));
        }
        extractor
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.init().unwrap();
        store
    }

    fn values(store: &SqliteStore, kind: StatKind) -> Vec<(String, f64)> {
        let StatTable { rows, .. } = store
            .query(&StatQuery::new(kind).limit(1000).session("s"))
            .unwrap();
        let mut values: Vec<(String, f64)> =
            rows.into_iter().map(|r| (r.name, r.value.as_f64())).collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    }

    #[test]
    fn test_schedule() {
        let mut schedule = FlushSchedule::new(Duration::seconds(60), base());
        assert!(!schedule.is_due(base() + Duration::seconds(59)));
        assert!(schedule.is_due(base() + Duration::seconds(60)));

        schedule.mark_flushed(base() + Duration::seconds(61));
        assert_eq!(schedule.last_flush(), base() + Duration::seconds(61));
        assert!(!schedule.is_due(base() + Duration::seconds(120)));
        assert!(schedule.is_due(base() + Duration::seconds(121)));
    }

    #[test]
    fn test_flush_counts_every_occurrence() {
        let store = store();
        let mut extractor = extractor_with("abab", 100);
        let report = AggregateFlusher::default()
            .flush(&store, "s", &mut extractor)
            .unwrap();

        assert_eq!(report.unigrams, 4);
        assert_eq!(report.bigrams, 3);
        assert_eq!(report.trigrams, 2);
        assert!(extractor.batch().is_empty());

        assert_eq!(
            values(&store, StatKind::Unigrams),
            vec![("a".to_string(), 2.0), ("b".to_string(), 2.0)]
        );
        assert_eq!(
            values(&store, StatKind::Bigrams),
            vec![("ab".to_string(), 2.0), ("ba".to_string(), 1.0)]
        );
        assert_eq!(
            values(&store, StatKind::Trigrams),
            vec![("aba".to_string(), 1.0), ("bab".to_string(), 1.0)]
        );
    }

    #[test]
    fn test_skipgram_weights_applied_once_per_pair() {
        let store = store();
        let mut extractor = extractor_with("abc", 100);
        let report = AggregateFlusher::default()
            .flush(&store, "s", &mut extractor)
            .unwrap();
        assert_eq!(report.skipgrams, 3);
        assert_eq!(
            values(&store, StatKind::Skipgrams),
            vec![
                ("ab".to_string(), 0.5),
                ("ac".to_string(), 0.25),
                ("bc".to_string(), 0.5)
            ]
        );

        let mut extractor = extractor_with("ab", 100);
        AggregateFlusher::default()
            .flush(&store, "s", &mut extractor)
            .unwrap();
        assert_eq!(values(&store, StatKind::Skipgrams)[0], ("ab".to_string(), 1.0));
    }

    #[test]
    fn test_empty_flush_changes_nothing() {
        let store = store();
        let flusher = AggregateFlusher::default();
        let mut extractor = extractor_with("hello", 50);
        flusher.flush(&store, "s", &mut extractor).unwrap();

        let before: Vec<_> = StatKind::ALL.iter().map(|k| values(&store, *k)).collect();
        let report = flusher.flush(&store, "s", &mut extractor).unwrap();
        let after: Vec<_> = StatKind::ALL.iter().map(|k| values(&store, *k)).collect();

        assert_eq!(report, FlushReport::default());
        assert_eq!(before, after);
    }

    #[test]
    fn test_rows_created_only_once_per_key() {
        let store = store();
        let flusher = AggregateFlusher::default();

        let mut extractor = extractor_with("aa", 5000);
        let report = flusher.flush(&store, "s", &mut extractor).unwrap();
        assert_eq!(report.unigrams, 2);
        // "a" unigram plus the "aa" skip-gram
        assert_eq!(report.rows_created, 2);

        let mut extractor = extractor_with("a", 0);
        let report = flusher.flush(&store, "s", &mut extractor).unwrap();
        assert_eq!(report.rows_created, 0);
        assert_eq!(values(&store, StatKind::Unigrams), vec![("a".to_string(), 3.0)]);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = store();
        let flusher = AggregateFlusher::default();
        flusher
            .flush(&store, "s", &mut extractor_with("x", 0))
            .unwrap();
        flusher
            .flush(&store, "other", &mut extractor_with("xx", 0))
            .unwrap();

        assert_eq!(values(&store, StatKind::Unigrams), vec![("x".to_string(), 1.0)]);
        assert_eq!(store.sessions().unwrap(), vec!["other", "s"]);
    }
}
