//! Session lifecycle state and counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a capture session
///
/// `Idle -> Starting -> Capturing -> Stopping -> Stopped`; a failed start goes
/// straight from `Starting` to `Stopping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Capturing,
    Stopping,
    Stopped,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Capturing => "capturing",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters shared between workers and the consumer
#[derive(Debug, Default)]
pub struct SessionStats {
    pub frames_received: AtomicU64,
    pub lines_discarded: AtomicU64,
    pub control_messages: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.lines_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_control(&self) {
        self.control_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_frames(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn get_discarded(&self) -> u64 {
        self.lines_discarded.load(Ordering::Relaxed)
    }

    pub fn get_control(&self) -> u64 {
        self.control_messages.load(Ordering::Relaxed)
    }
}

/// Outcome of a session that reached `capturing`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub records_written: u64,
    pub frames_received: u64,
    pub lines_discarded: u64,
    /// Why capture ended; empty after an explicit stop
    pub reason: String,
}
