//! Persistent per-session aggregate storage.
//!
//! Four tables hold the aggregates: `unigrams`, `bigrams`, `trigrams` (with an
//! integer `freq` column) and `skipgrams` (with a float `weight` column). Each
//! row is keyed by `(name, session)`. Uniqueness of that key is kept by the
//! callers reading before they write; the store itself does not enforce it.

pub mod sqlite;

pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which aggregate table a row lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Unigrams,
    Bigrams,
    Trigrams,
    Skipgrams,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [
        StatKind::Unigrams,
        StatKind::Bigrams,
        StatKind::Trigrams,
        StatKind::Skipgrams,
    ];

    pub fn table(self) -> &'static str {
        match self {
            StatKind::Unigrams => "unigrams",
            StatKind::Bigrams => "bigrams",
            StatKind::Trigrams => "trigrams",
            StatKind::Skipgrams => "skipgrams",
        }
    }

    /// Name of the value column for this table.
    pub fn value_column(self) -> &'static str {
        match self {
            StatKind::Skipgrams => "weight",
            _ => "freq",
        }
    }

    pub fn is_weighted(self) -> bool {
        self == StatKind::Skipgrams
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for StatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "letters" | "unigrams" => Ok(StatKind::Unigrams),
            "bigrams" => Ok(StatKind::Bigrams),
            "trigrams" => Ok(StatKind::Trigrams),
            "skipgrams" => Ok(StatKind::Skipgrams),
            other => Err(format!(
                "unknown stat '{other}' (expected letters, bigrams, trigrams or skipgrams)"
            )),
        }
    }
}

/// A stored frequency or weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Freq(u64),
    Weight(f64),
}

impl StatValue {
    pub fn as_f64(self) -> f64 {
        match self {
            StatValue::Freq(n) => n as f64,
            StatValue::Weight(w) => w,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Freq(n) => write!(f, "{n}"),
            StatValue::Weight(w) => write!(f, "{w:.4}"),
        }
    }
}

/// Column used to order query results. Results are always descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Name,
    #[default]
    Value,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "value" | "freq" | "weight" => Ok(SortKey::Value),
            other => Err(format!("unknown sort key '{other}' (expected name or value)")),
        }
    }
}

/// Row id assigned by the store.
pub type RowId = i64;

/// One persisted aggregate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRow {
    pub id: RowId,
    pub name: String,
    pub value: StatValue,
    pub session: String,
}

/// A top-N query over one aggregate table.
#[derive(Debug, Clone)]
pub struct StatQuery {
    pub kind: StatKind,
    pub limit: usize,
    pub sort_by: SortKey,
    /// Restrict to one session; all sessions when `None`
    pub session: Option<String>,
}

impl StatQuery {
    pub fn new(kind: StatKind) -> Self {
        Self {
            kind,
            limit: 20,
            sort_by: SortKey::Value,
            session: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn sort_by(mut self, sort_by: SortKey) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }
}

/// Query result: column names followed by the matching rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatTable {
    pub header: Vec<String>,
    pub rows: Vec<StatRow>,
}

/// Errors raised by a session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("could not create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("row {id} not found in {kind}")]
    MissingRow { kind: StatKind, id: RowId },
    #[error("{kind} stores {expected} values")]
    ValueKind {
        kind: StatKind,
        expected: &'static str,
    },
}

/// Durable row storage keyed by `(name, session)`.
pub trait SessionStore {
    /// Create the aggregate tables if they are missing.
    fn init(&self) -> Result<(), StoreError>;

    /// Look up the row for `(name, session)`.
    fn find_row(&self, kind: StatKind, name: &str, session: &str)
        -> Result<Option<RowId>, StoreError>;

    /// Insert a new row seeded with `value`.
    fn insert_row(
        &self,
        kind: StatKind,
        name: &str,
        value: StatValue,
        session: &str,
    ) -> Result<RowId, StoreError>;

    /// Add `delta` to the value of an existing row.
    fn add_to_row(&self, kind: StatKind, id: RowId, delta: StatValue) -> Result<(), StoreError>;

    /// Run a top-N query.
    fn query(&self, query: &StatQuery) -> Result<StatTable, StoreError>;

    /// Distinct session names across all tables, sorted.
    fn sessions(&self) -> Result<Vec<String>, StoreError>;

    /// Values of `kind` summed per name, across sessions unless one is given.
    fn totals(
        &self,
        kind: StatKind,
        session: Option<&str>,
    ) -> Result<Vec<(String, StatValue)>, StoreError>;
}
