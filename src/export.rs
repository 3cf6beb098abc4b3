//! Corpus export for layout analyzers.
//!
//! The corpus is a JSON object with one map per stat kind plus totals, in
//! the shape genkey-style analyzers read.

use crate::store::{SessionStore, StatKind, StatValue, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Aggregate statistics across one or all sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    pub letters: BTreeMap<String, u64>,
    pub bigrams: BTreeMap<String, u64>,
    pub trigrams: BTreeMap<String, u64>,
    pub skipgrams: BTreeMap<String, f64>,
    pub total_letters: u64,
    pub total_bigrams: u64,
    pub total_trigrams: u64,
    pub total_skipgrams: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not write corpus: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not serialize corpus: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn frequencies<S>(
    store: &S,
    kind: StatKind,
    session: Option<&str>,
) -> Result<BTreeMap<String, u64>, StoreError>
where
    S: SessionStore + ?Sized,
{
    Ok(store
        .totals(kind, session)?
        .into_iter()
        .map(|(name, value)| match value {
            StatValue::Freq(n) => (name, n),
            StatValue::Weight(w) => (name, w.max(0.0) as u64),
        })
        .collect())
}

/// Sum the stored aggregates into a corpus.
pub fn build_corpus<S>(store: &S, session: Option<&str>) -> Result<Corpus, StoreError>
where
    S: SessionStore + ?Sized,
{
    let letters = frequencies(store, StatKind::Unigrams, session)?;
    let bigrams = frequencies(store, StatKind::Bigrams, session)?;
    let trigrams = frequencies(store, StatKind::Trigrams, session)?;
    let skipgrams: BTreeMap<String, f64> = store
        .totals(StatKind::Skipgrams, session)?
        .into_iter()
        .map(|(name, value)| (name, value.as_f64()))
        .collect();

    Ok(Corpus {
        total_letters: letters.values().sum(),
        total_bigrams: bigrams.values().sum(),
        total_trigrams: trigrams.values().sum(),
        total_skipgrams: skipgrams.values().sum(),
        letters,
        bigrams,
        trigrams,
        skipgrams,
    })
}

/// Default file name for an export written at `now`.
pub fn export_file_path(dir: &Path, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!("corpus_{}.json", now.format("%Y%m%d_%H%M%S")))
}

/// Write `corpus` as pretty JSON, creating parent directories.
pub fn write_corpus(corpus: &Corpus, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(corpus)?;
    std::fs::write(path, json)?;
    Ok(())
}
