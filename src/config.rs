//! Command line configuration
//!
//! Wireshark drives extcap programs through fixed `--extcap-*` flags; serial
//! tuning can also come from the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::capture::SessionConfig;
use crate::device::SerialConfig;
use crate::error::ConfigError;
use crate::pcap::OutputTarget;
use crate::sniffer::{Channel, MetadataMode, MIN_CHANNEL};

/// Extcap program for the nRF 802.15.4 sniffer
#[derive(Parser, Debug)]
#[command(name = "nrf802154-sniffer", version, about)]
pub struct Cli {
    /// Provide a list of interfaces to capture from
    #[arg(long)]
    pub extcap_interfaces: bool,

    /// Extcap protocol version offered by Wireshark
    #[arg(long)]
    pub extcap_version: Option<String>,

    /// Provide the interface to capture from
    #[arg(long)]
    pub extcap_interface: Option<String>,

    /// Provide a list of dlts for the given interface
    #[arg(long)]
    pub extcap_dlts: bool,

    /// Provide a list of configurations for the given interface
    #[arg(long)]
    pub extcap_config: bool,

    /// Reload elements for the given option
    #[arg(long)]
    pub extcap_reload_option: Option<String>,

    /// Start the capture routine
    #[arg(long)]
    pub capture: bool,

    /// Fifo (or file) to write the capture to; `-` for stdout
    #[arg(long)]
    pub fifo: Option<String>,

    /// Capture filter (accepted, not applied)
    #[arg(long)]
    pub extcap_capture_filter: Option<String>,

    /// Control messages from the Wireshark toolbar
    #[arg(long)]
    pub extcap_control_in: Option<PathBuf>,

    /// Control messages to the Wireshark toolbar
    #[arg(long)]
    pub extcap_control_out: Option<PathBuf>,

    /// IEEE 802.15.4 capture channel [11-26]
    #[arg(long, default_value_t = MIN_CHANNEL)]
    pub channel: u8,

    /// Serial device connected to the sniffer
    #[arg(long)]
    pub dev: Option<String>,

    /// Out-of-band metadata: none or ieee802154-tap
    #[arg(long, default_value = "none")]
    pub metadata: String,

    /// Serial baud rate
    #[arg(long, env = "SNIFFER_BAUD_RATE", default_value_t = 115_200)]
    pub baud_rate: u32,

    /// Delay before opening the device, in milliseconds
    #[arg(long, env = "SNIFFER_SETTLE_MS", default_value_t = 2_000)]
    pub settle_ms: u64,
}

impl Cli {
    /// Validate capture arguments into a session configuration
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let device = self.dev.clone().ok_or(ConfigError::MissingDevice)?;
        let fifo = self.fifo.as_deref().ok_or(ConfigError::MissingOutput)?;

        Ok(SessionConfig {
            device,
            channel: Channel::new(self.channel)?,
            metadata: self.metadata.parse()?,
            output: OutputTarget::from_arg(fifo),
            control_in: self.extcap_control_in.clone(),
            control_out: self.extcap_control_out.clone(),
            settle_delay: Duration::from_millis(self.settle_ms),
        })
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud_rate,
            ..SerialConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nrf802154-sniffer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_capture_arguments() {
        let cli = parse(&[
            "--capture",
            "--extcap-interface",
            "nrf802154",
            "--fifo",
            "/tmp/wireshark_extcap_fifo",
            "--channel",
            "15",
            "--dev",
            "/dev/ttyACM0",
            "--metadata",
            "ieee802154-tap",
            "--extcap-control-in",
            "/tmp/ctrl_in",
            "--settle-ms",
            "0",
        ]);

        let config = cli.session_config().unwrap();
        assert_eq!(config.device, "/dev/ttyACM0");
        assert_eq!(config.channel.number(), 15);
        assert_eq!(config.metadata, MetadataMode::Ieee802154Tap);
        assert!(matches!(config.output, OutputTarget::Path(_)));
        assert_eq!(config.control_in, Some(PathBuf::from("/tmp/ctrl_in")));
        assert!(config.control_out.is_none());
        assert!(config.settle_delay.is_zero());
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--capture", "--fifo", "-", "--dev", "COM3"]);
        let config = cli.session_config().unwrap();
        assert_eq!(config.channel.number(), 11);
        assert_eq!(config.metadata, MetadataMode::None);
        assert!(matches!(config.output, OutputTarget::Stdout));
        assert_eq!(config.settle_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let cli = parse(&["--capture", "--fifo", "-", "--dev", "COM3", "--channel", "27"]);
        assert!(matches!(cli.session_config(), Err(ConfigError::ChannelOutOfRange(27))));

        let cli = parse(&["--capture", "--fifo", "-"]);
        assert!(matches!(cli.session_config(), Err(ConfigError::MissingDevice)));

        let cli = parse(&["--capture", "--dev", "COM3"]);
        assert!(matches!(cli.session_config(), Err(ConfigError::MissingOutput)));

        let cli = parse(&["--capture", "--fifo", "-", "--dev", "COM3", "--metadata", "user"]);
        assert!(matches!(cli.session_config(), Err(ConfigError::UnknownMetadata(_))));
    }

    #[test]
    fn test_discovery_flags() {
        let cli = parse(&["--extcap-interfaces", "--extcap-version=4.2"]);
        assert!(cli.extcap_interfaces);
        assert!(!cli.capture);

        let cli = parse(&["--extcap-config", "--extcap-interface", "nrf802154", "--extcap-reload-option", "dev"]);
        assert!(cli.extcap_config);
        assert_eq!(cli.extcap_reload_option.as_deref(), Some("dev"));
    }
}
