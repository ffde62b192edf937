//! Wireshark extcap capability discovery
//!
//! Static text answering `--extcap-interfaces`, `--extcap-dlts` and
//! `--extcap-config`.

use tracing::warn;

use crate::sniffer::{LinkType, MetadataMode, MAX_CHANNEL, MIN_CHANNEL};

/// Interface name Wireshark passes back with `--extcap-interface`
pub const INTERFACE: &str = "nrf802154";

const DISPLAY_NAME: &str = "nRF 802.15.4 sniffer";
const HELP_URL: &str = "https://github.com/NordicSemiconductor/nRF-Sniffer-for-802.15.4";

const ARG_CHANNEL: u32 = 0;
const ARG_METADATA: u32 = 1;
const ARG_DEV: u32 = 2;

/// Answer to `--extcap-interfaces`
pub fn interfaces() -> String {
    [
        format!(
            "extcap {{version={}}}{{help={}}}{{display={}}}",
            env!("CARGO_PKG_VERSION"),
            HELP_URL,
            DISPLAY_NAME
        ),
        format!("interface {{value={}}}{{display={}}}", INTERFACE, DISPLAY_NAME),
    ]
    .join("\n")
}

/// Answer to `--extcap-dlts`
pub fn dlts() -> String {
    [LinkType::Ieee802154NoFcs, LinkType::Ieee802154Tap]
        .iter()
        .map(|lt| {
            format!(
                "dlt {{number={}}}{{name={}}}{{display={}}}",
                lt.number(),
                lt.name(),
                lt.description()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer to `--extcap-config`, optionally limited to one reloadable option
pub fn config(reload_option: Option<&str>, ports: &[String]) -> String {
    let mut lines = Vec::new();

    match reload_option.filter(|o| !o.is_empty()) {
        Some("dev") => lines.extend(port_values(ports)),
        Some(other) => warn!("No reloadable values for option '{}'", other),
        None => {
            lines.push(format!(
                "arg {{number={}}}{{call=--channel}}{{display=Channel}}{{tooltip=IEEE 802.15.4 channel}}{{type=selector}}{{required=true}}{{default={}}}",
                ARG_CHANNEL, MIN_CHANNEL
            ));
            lines.push(format!(
                "arg {{number={}}}{{call=--metadata}}{{display=Out-Of-Band meta-data}}{{tooltip=Packet header containing out-of-band meta-data for channel, RSSI and LQI}}{{type=selector}}{{default={}}}",
                ARG_METADATA,
                MetadataMode::None.as_str()
            ));
            lines.push(format!(
                "arg {{number={}}}{{call=--dev}}{{display=Device}}{{tooltip=Serial device connected to the sniffer}}{{type=selector}}{{required=true}}{{reload=true}}{{placeholder=Loading serial devices ...}}",
                ARG_DEV
            ));

            for channel in MIN_CHANNEL..=MAX_CHANNEL {
                lines.push(format!(
                    "value {{arg={}}}{{value={}}}{{display={}}}{{default={}}}",
                    ARG_CHANNEL,
                    channel,
                    channel,
                    channel == MIN_CHANNEL
                ));
            }

            for (mode, display) in [
                (MetadataMode::None, "None"),
                (MetadataMode::Ieee802154Tap, "IEEE 802.15.4 TAP"),
            ] {
                lines.push(format!(
                    "value {{arg={}}}{{value={}}}{{display={}}}{{default={}}}",
                    ARG_METADATA,
                    mode.as_str(),
                    display,
                    mode == MetadataMode::default()
                ));
            }

            lines.extend(port_values(ports));
        }
    }

    lines.join("\n")
}

fn port_values(ports: &[String]) -> impl Iterator<Item = String> + '_ {
    ports.iter().map(|port| {
        format!(
            "value {{arg={}}}{{value={}}}{{display={}}}{{default=false}}",
            ARG_DEV, port, port
        )
    })
}

/// Serial ports currently present on the host
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            warn!("Cannot enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interfaces() {
        let text = interfaces();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("extcap {version="));
        assert_eq!(lines[1], "interface {value=nrf802154}{display=nRF 802.15.4 sniffer}");
    }

    #[test]
    fn test_dlts() {
        assert_eq!(
            dlts(),
            "dlt {number=230}{name=IEEE802_15_4_NOFCS}{display=IEEE 802.15.4 without FCS}\n\
             dlt {number=283}{name=IEEE802_15_4_TAP}{display=IEEE 802.15.4 TAP}"
        );
    }

    #[test]
    fn test_config_full() {
        let ports = vec!["/dev/ttyACM0".to_string()];
        let text = config(None, &ports);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.iter().filter(|l| l.starts_with("arg ")).count(), 3);
        assert_eq!(lines.iter().filter(|l| l.starts_with("value {arg=0}")).count(), 16);
        assert!(lines.contains(&"value {arg=0}{value=11}{display=11}{default=true}"));
        assert!(lines.contains(&"value {arg=0}{value=26}{display=26}{default=false}"));
        assert!(lines.contains(&"value {arg=1}{value=ieee802154-tap}{display=IEEE 802.15.4 TAP}{default=false}"));
        assert_eq!(
            lines.last(),
            Some(&"value {arg=2}{value=/dev/ttyACM0}{display=/dev/ttyACM0}{default=false}")
        );
    }

    #[test]
    fn test_config_reload_dev() {
        let ports = vec!["/dev/ttyACM0".to_string(), "/dev/ttyACM1".to_string()];
        let text = config(Some("dev"), &ports);
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("value {arg=2}")));

        assert!(config(Some("channel"), &ports).is_empty());
        assert_eq!(config(Some(""), &ports), config(None, &ports));
    }
}
