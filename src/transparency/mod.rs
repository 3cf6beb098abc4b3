//! Transparency counters for the key logger.
//!
//! Lets the operator see how much was logged, discarded and persisted
//! without exposing any key content.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
