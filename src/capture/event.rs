//! Events posted by capture workers to the session consumer

use crate::sniffer::CapturedFrame;

/// Anything a worker can tell the consumer
#[derive(Debug)]
pub enum SessionEvent {
    Frame(CapturedFrame),
    Control(ControlEvent),
    Terminate(TerminationEvent),
}

/// One message from the control-in pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    /// Control number the message addresses
    pub control: u8,
    /// Command code
    pub command: u8,
    pub payload: Vec<u8>,
}

/// Request to end the session; an empty reason means an explicit stop
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TerminationEvent {
    pub reason: String,
}

impl TerminationEvent {
    pub fn requested() -> Self {
        Self::default()
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn is_requested(&self) -> bool {
        self.reason.is_empty()
    }
}
