//! Error types for configuration and capture sessions

use std::io;

/// Invalid configuration, detected before any device I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("channel {0} is outside the IEEE 802.15.4 range 11-26")]
    ChannelOutOfRange(u8),

    #[error("--dev is required if --capture is present")]
    MissingDevice,

    #[error("--fifo is required if --capture is present")]
    MissingOutput,

    #[error("unknown metadata mode '{0}' (expected 'none' or 'ieee802154-tap')")]
    UnknownMetadata(String),
}

/// Failures that end a capture session before or outside of normal capture
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot set up sniffer on {device}: {source}")]
    Setup {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot open capture output: {source}")]
    Output {
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("session already stopped; construct a new session to capture again")]
    NotReusable,
}
