//! Device clock to host clock translation
//!
//! The sniffer stamps frames with a free-running 32-bit microsecond counter.
//! The first frame of a session anchors that counter to host wall-clock time;
//! every later stamp is placed relative to the anchor.

/// Host wall-clock time in microseconds since the Unix epoch
pub fn host_now_us() -> u64 {
    chrono::Utc::now().timestamp_micros().max(0) as u64
}

/// Reference pair recorded on the first frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClockReference {
    first_host_us: u64,
    first_device: u32,
}

/// Maps device timestamps onto continuous host time
#[derive(Debug, Default)]
pub struct ClockTranslator {
    reference: Option<ClockReference>,
}

impl ClockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate a device timestamp to host microseconds
    pub fn correct(&mut self, device_ts: u32) -> u64 {
        self.correct_with(device_ts, host_now_us)
    }

    /// Same as [`correct`](Self::correct) with an explicit host clock source
    pub fn correct_with(&mut self, device_ts: u32, now_us: impl FnOnce() -> u64) -> u64 {
        match self.reference {
            Some(reference) => {
                // Elapsed device time is taken modulo the counter width
                let elapsed = device_ts.wrapping_sub(reference.first_device);
                reference.first_host_us + elapsed as u64
            }
            None => {
                let first_host_us = now_us();
                self.reference = Some(ClockReference {
                    first_host_us,
                    first_device: device_ts,
                });
                first_host_us
            }
        }
    }

    /// Whether the first frame has anchored the clock
    #[cfg(test)]
    pub fn is_anchored(&self) -> bool {
        self.reference.is_some()
    }
}
