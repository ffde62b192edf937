//! pcap encoding and streaming output

pub mod format;
mod sink;

pub use format::encode_record;
pub use sink::{OutputSink, OutputTarget};

#[cfg(test)]
pub use sink::SharedBuffer;
