//! Sniffer data types

use std::fmt;

use crate::error::ConfigError;

/// Lowest IEEE 802.15.4 channel in the 2.4 GHz band
pub const MIN_CHANNEL: u8 = 11;

/// Highest IEEE 802.15.4 channel in the 2.4 GHz band
pub const MAX_CHANNEL: u8 = 26;

/// A validated 2.4 GHz IEEE 802.15.4 channel (11..=26)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel(u8);

impl Channel {
    pub fn new(channel: u8) -> Result<Self, ConfigError> {
        if (MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
            Ok(Self(channel))
        } else {
            Err(ConfigError::ChannelOutOfRange(channel))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Channel {
    type Error = ConfigError;

    fn try_from(channel: u8) -> Result<Self, Self::Error> {
        Self::new(channel)
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self(MIN_CHANNEL)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Out-of-band metadata carried with each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataMode {
    /// Bare PSDU, no per-packet metadata
    #[default]
    None,
    /// IEEE 802.15.4 TAP header with RSSI, channel and LQI TLVs
    Ieee802154Tap,
}

impl MetadataMode {
    /// Name used on the command line and in capability text
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ieee802154Tap => "ieee802154-tap",
        }
    }

    pub fn link_type(self) -> LinkType {
        match self {
            Self::None => LinkType::Ieee802154NoFcs,
            Self::Ieee802154Tap => LinkType::Ieee802154Tap,
        }
    }
}

impl std::str::FromStr for MetadataMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "ieee802154-tap" => Ok(Self::Ieee802154Tap),
            other => Err(ConfigError::UnknownMetadata(other.to_string())),
        }
    }
}

/// Capture file link-layer header types (tcpdump.org/linktypes.html)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LinkType {
    /// LINKTYPE_IEEE802_15_4_NOFCS
    Ieee802154NoFcs = 230,
    /// LINKTYPE_IEEE802_15_4_TAP
    Ieee802154Tap = 283,
}

impl LinkType {
    pub fn number(self) -> u32 {
        self as u32
    }

    /// Wireshark DLT name
    pub fn name(self) -> &'static str {
        match self {
            Self::Ieee802154NoFcs => "IEEE802_15_4_NOFCS",
            Self::Ieee802154Tap => "IEEE802_15_4_TAP",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Ieee802154NoFcs => "IEEE 802.15.4 without FCS",
            Self::Ieee802154Tap => "IEEE 802.15.4 TAP",
        }
    }

    pub fn has_metadata(self) -> bool {
        matches!(self, Self::Ieee802154Tap)
    }
}

/// One frame reported by the sniffer firmware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// PSDU with the trailing 2-byte FCS removed
    pub psdu: Vec<u8>,

    /// Device timestamp in microseconds, wraps at 2^32
    pub device_timestamp: u32,

    /// Received signal strength in dBm
    pub rssi: i32,

    /// Link quality indicator
    pub lqi: u32,
}
