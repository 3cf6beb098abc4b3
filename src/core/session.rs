//! A single logging run: capture, periodic flush, final flush.
//!
//! A [`KeySession`] moves through `Idle -> Capturing -> (Flushing ->
//! Capturing)* -> Stopped`. Everything that lives for one run (the session
//! name, the last-flush time, the in-memory batch) is owned here and dropped
//! with it. A stopped session cannot be restarted; start a new one instead.

use crate::collector::types::RawKeyPress;
use crate::core::flush::{AggregateFlusher, FlushReport, FlushSchedule};
use crate::core::keymap::normalize;
use crate::core::ngrams::{KeyEvent, NGramBatch, NGramExtractor};
use crate::core::skipgram::SkipgramWeigher;
use crate::store::SessionStore;
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Lifecycle of a session run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Flushing,
    Stopped,
}

/// Errors from driving a session in the wrong state.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Logging is not in session.")]
    NotActive,
    #[error("Logger is already running.")]
    AlreadyRunning,
    #[error("Session has been stopped; start a new session to continue logging.")]
    Stopped,
}

/// Tunables for the n-gram pipeline.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub flush_interval: Duration,
    pub bigram_window: Duration,
    pub trigram_window: Duration,
    pub skipgram_history: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            flush_interval: Duration::seconds(crate::core::flush::DEFAULT_FLUSH_INTERVAL_SECS),
            bigram_window: Duration::milliseconds(crate::core::ngrams::DEFAULT_BIGRAM_WINDOW_MS),
            trigram_window: Duration::milliseconds(crate::core::ngrams::DEFAULT_TRIGRAM_WINDOW_MS),
            skipgram_history: crate::core::skipgram::DEFAULT_HISTORY_LEN,
        }
    }
}

/// Per-run state created at start.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Session name all rows are written under
    pub name: String,
    /// Identifies this particular run in diagnostics
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    schedule: FlushSchedule,
}

impl SessionContext {
    pub fn last_flush(&self) -> DateTime<Utc> {
        self.schedule.last_flush()
    }
}

/// Drives the n-gram pipeline for one named session.
pub struct KeySession<S: SessionStore> {
    name: String,
    options: SessionOptions,
    store: S,
    state: SessionState,
    context: Option<SessionContext>,
    extractor: NGramExtractor,
    flusher: AggregateFlusher,
    log: SharedTransparencyLog,
}

impl<S: SessionStore> KeySession<S> {
    pub fn new(name: impl Into<String>, store: S, options: SessionOptions) -> Self {
        let extractor = NGramExtractor::new(options.bigram_window, options.trigram_window);
        let flusher = AggregateFlusher::new(SkipgramWeigher::new(options.skipgram_history));
        Self {
            name: name.into(),
            options,
            store,
            state: SessionState::Idle,
            context: None,
            extractor,
            flusher,
            log: create_shared_log(),
        }
    }

    /// Use `log` for transparency counters instead of a private one.
    pub fn with_log(mut self, log: SharedTransparencyLog) -> Self {
        self.log = log;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    /// The batch accumulated since the last flush.
    pub fn batch(&self) -> &NGramBatch {
        self.extractor.batch()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn log(&self) -> &SharedTransparencyLog {
        &self.log
    }

    /// Begin capturing. The flush timer starts at `now`.
    ///
    /// A store that cannot be initialized is reported and capture proceeds;
    /// the flushes will report their own failures.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Idle => {}
            SessionState::Capturing | SessionState::Flushing => {
                return Err(SessionError::AlreadyRunning)
            }
            SessionState::Stopped => return Err(SessionError::Stopped),
        }

        if let Err(e) = self.store.init() {
            tracing::error!(session = %self.name, "Could not initialize store: {e}");
        }

        let context = SessionContext {
            name: self.name.clone(),
            run_id: Uuid::new_v4(),
            started_at: now,
            schedule: FlushSchedule::new(self.options.flush_interval, now),
        };
        tracing::info!(session = %context.name, run_id = %context.run_id, "Session started");

        self.context = Some(context);
        self.extractor.clear();
        self.state = SessionState::Capturing;
        Ok(())
    }

    /// Feed a raw key press. Untracked keys are discarded.
    ///
    /// Returns the flush report when this press triggered a periodic flush.
    pub fn record(&mut self, press: &RawKeyPress) -> Result<Option<FlushReport>, SessionError> {
        self.ensure_capturing()?;
        match normalize(&press.key) {
            Some(name) => self.observe(KeyEvent::new(name, press.timestamp)),
            None => {
                self.log.record_key_discarded();
                Ok(None)
            }
        }
    }

    /// Feed an already-normalized key event.
    pub fn observe(&mut self, event: KeyEvent) -> Result<Option<FlushReport>, SessionError> {
        self.ensure_capturing()?;

        let timestamp = event.timestamp;
        self.extractor.observe(event);
        self.log.record_key_logged();

        let due = self
            .context
            .as_ref()
            .map(|ctx| ctx.schedule.is_due(timestamp))
            .unwrap_or(false);
        if !due {
            return Ok(None);
        }

        let report = self.run_flush();
        if let Some(ctx) = self.context.as_mut() {
            ctx.schedule.mark_flushed(timestamp);
        }
        self.state = SessionState::Capturing;
        Ok(report)
    }

    /// Flush whatever is pending and end the session.
    pub fn stop(&mut self) -> Result<Option<FlushReport>, SessionError> {
        if self.state != SessionState::Capturing {
            return Err(SessionError::NotActive);
        }

        let report = self.run_flush();
        self.state = SessionState::Stopped;
        if let Some(ctx) = self.context.take() {
            tracing::info!(
                session = %ctx.name,
                run_id = %ctx.run_id,
                duration_secs = (Utc::now() - ctx.started_at).num_seconds(),
                "Session ended"
            );
        }
        Ok(report)
    }

    fn ensure_capturing(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Capturing => Ok(()),
            SessionState::Stopped => Err(SessionError::Stopped),
            SessionState::Idle | SessionState::Flushing => Err(SessionError::NotActive),
        }
    }

    /// Write and clear the batch. Store failures are reported, not returned.
    fn run_flush(&mut self) -> Option<FlushReport> {
        self.state = SessionState::Flushing;
        match self
            .flusher
            .flush(&self.store, &self.name, &mut self.extractor)
        {
            Ok(report) => {
                self.log.record_flush_completed();
                Some(report)
            }
            Err(e) => {
                self.log.record_flush_failed();
                tracing::error!(session = %self.name, "Flush failed: {e}");
                None
            }
        }
    }
}
