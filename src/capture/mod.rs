//! Capture pipeline
//!
//! 1. `serial-reader` worker parses sniffer reports into frames
//! 2. Optional `control-reader` watches the control-in pipe for disconnection
//! 3. The session consumer stamps, encodes and writes each frame in order
//! 4. The first termination event tears everything down

pub mod control;
pub mod event;
mod reader;
pub mod session;
mod state;
mod worker;

pub use session::{CaptureSession, SessionConfig};
