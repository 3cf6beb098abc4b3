//! Non-macOS (noop) implementation of key collection.
//!
//! No system-wide key capture is available here. The collector still hands
//! out a channel so presses can be fed in through [`NoopCollector::sender`],
//! which is how tests and alternative capture front-ends drive a session.

use crate::collector::types::RawKeyPress;
use crate::collector::{CollectorConfig, CollectorError};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A collector that never captures presses on its own.
pub struct NoopCollector {
    sender: Sender<RawKeyPress>,
    receiver: Receiver<RawKeyPress>,
    running: Arc<AtomicBool>,
}

impl NoopCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity);
        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start capturing key presses.
    ///
    /// On non-macOS platforms, this simply marks the collector as running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for key presses.
    pub fn receiver(&self) -> &Receiver<RawKeyPress> {
        &self.receiver
    }

    /// Get a sender that injects presses into this collector's stream.
    pub fn sender(&self) -> Sender<RawKeyPress> {
        self.sender.clone()
    }
}

/// On non-macOS platforms there is no Input Monitoring permission gate.
pub fn check_permission() -> bool {
    true
}
