//! macOS implementation of key collection using a CGEvent tap.
//!
//! This module listens for key-down events at the session level using
//! Core Graphics. It requires Input Monitoring permission. Only the virtual
//! key code and modifier state leave the callback; mapping them to key names
//! happens in [`crate::core::keymap`].

use crate::collector::types::{RawKey, RawKeyPress};
use crate::collector::{CollectorConfig, CollectorError};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, CallbackResult, EventField,
};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The macOS key collector using a CGEvent tap.
pub struct MacOSCollector {
    sender: Sender<RawKeyPress>,
    receiver: Receiver<RawKeyPress>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(config.channel_capacity);

        Self {
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start capturing key presses in a background thread.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone()) {
                tracing::error!("Event loop error: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing key presses and join the capture thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for key presses.
    pub fn receiver(&self) -> &Receiver<RawKeyPress> {
        &self.receiver
    }
}

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_event_loop(
    sender: Sender<RawKeyPress>,
    running: Arc<AtomicBool>,
) -> Result<(), CollectorError> {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        move |_proxy, event_type, event| {
            if let Some(press) = process_cg_event(event_type, event) {
                // The tap must never block; a full queue means the processing
                // loop is more than a channel's worth of presses behind.
                if let Err(TrySendError::Full(_)) = sender.try_send(press) {
                    tracing::warn!("Key press queue full, dropping press");
                }
            }
            CallbackResult::Keep
        },
    )
    .map_err(|_| CollectorError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| CollectorError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            std::time::Duration::from_millis(100),
            false,
        );
    }

    Ok(())
}

/// Extract the virtual key code and shift/caps-lock state from a key-down event.
fn process_cg_event(event_type: CGEventType, event: &CGEvent) -> Option<RawKeyPress> {
    match event_type {
        CGEventType::KeyDown => {
            let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
            let code = u16::try_from(code).ok()?;
            let flags = event.get_flags();
            Some(RawKeyPress::new(RawKey::KeyCode {
                code,
                shift: flags.contains(CGEventFlags::CGEventFlagShift),
                caps_lock: flags.contains(CGEventFlags::CGEventFlagAlphaShift),
            }))
        }
        _ => None,
    }
}

/// Check if the application has Input Monitoring permission.
///
/// macOS offers no direct query, so this tries to create a passive tap.
pub fn check_permission() -> bool {
    CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    )
    .is_ok()
}
