//! nRF 802.15.4 sniffer report handling
//!
//! 1. Parse `received:` report lines from the serial link
//! 2. Translate the device's 32-bit microsecond clock to host time

mod clock;
pub mod parser;
mod types;

pub use clock::ClockTranslator;
pub use parser::parse_line;
pub use types::{CapturedFrame, Channel, LinkType, MetadataMode, MAX_CHANNEL, MIN_CHANNEL};
