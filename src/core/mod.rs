//! Core n-gram pipeline.
//!
//! This module contains:
//! - Key normalization from raw presses to symbolic names
//! - Time-gated 1/2/3-gram extraction
//! - Decayed skip-gram weighting
//! - Flushing batches into the session store
//! - The session lifecycle tying them together

pub mod flush;
pub mod keymap;
pub mod ngrams;
pub mod session;
pub mod skipgram;

pub use flush::{AggregateFlusher, FlushReport, FlushSchedule};
pub use keymap::{normalize, KeyName, SpecialKey};
pub use ngrams::{KeyEvent, NGramBatch, NGramExtractor, NGramRecord};
pub use session::{KeySession, SessionContext, SessionError, SessionOptions, SessionState};
pub use skipgram::{SkipgramWeigher, SkipgramWeights};
