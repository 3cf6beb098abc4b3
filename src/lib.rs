//! Key Logger - keystroke statistics for keyboard layout optimization.
//!
//! Key presses are turned into n-gram and skip-gram aggregates and stored
//! per named session, so layout analyzers can work from real typing data.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                          Key Logger                           │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌───────────┐   ┌───────────┐   ┌─────────┐  │
//! │  │ Collector │──▶│  Keymap   │──▶│  N-grams  │──▶│  Flush  │  │
//! │  │  (macOS)  │   │(normalize)│   │ (1/2/3)   │   │ (timer) │  │
//! │  └───────────┘   └───────────┘   └───────────┘   └─────────┘  │
//! │                                        │              │       │
//! │                                        ▼              ▼       │
//! │                                  ┌───────────┐   ┌─────────┐  │
//! │                                  │ Skip-grams│──▶│  Store  │  │
//! │                                  │ (decayed) │   │(SQLite) │  │
//! │                                  └───────────┘   └─────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use key_logger::{KeySession, RawKeyPress, SessionOptions, SqliteStore};
//!
//! let store = SqliteStore::open(std::path::Path::new("logger.db")).unwrap();
//! let mut session = KeySession::new("writing", store, SessionOptions::default());
//! session.start(Utc::now()).unwrap();
//!
//! for c in "hello".chars() {
//!     session.record(&RawKeyPress::character(c, Utc::now())).unwrap();
//! }
//!
//! session.stop().unwrap();
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod export;
pub mod store;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{Collector, CollectorConfig, CollectorError, RawKey, RawKeyPress};
pub use config::{Config, ConfigError};
pub use core::{
    AggregateFlusher, FlushReport, KeyEvent, KeyName, KeySession, NGramExtractor, SessionError,
    SessionOptions, SessionState, SkipgramWeigher,
};
pub use export::{build_corpus, write_corpus, Corpus, ExportError};
pub use store::{SessionStore, SortKey, SqliteStore, StatKind, StatQuery, StatTable, StoreError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Typed at the `run` prompt to end a session.
pub const END_COMMAND: &str = ".end";
