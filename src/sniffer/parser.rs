//! Sniffer report line parser
//!
//! The firmware prints one line per received frame:
//!
//! ```text
//! received: 4188819600ffff0212 power: -60 lqi: 200 time: 1000000
//! ```
//!
//! Everything else on the serial link (shell banners, command echoes,
//! partial lines) is noise and yields `None`.

use super::types::CapturedFrame;

/// Marker that starts a frame report
const RECEIVED_TAG: &str = "received:";

/// Length of the frame check sequence the firmware leaves on the PSDU
const FCS_LEN: usize = 2;

/// Parse one line of sniffer output into a captured frame
pub fn parse_line(line: &str) -> Option<CapturedFrame> {
    let start = line.find(RECEIVED_TAG)?;
    let mut fields = line[start + RECEIVED_TAG.len()..].split_whitespace();

    let hex_str = fields.next()?;
    let rssi: i32 = tagged_value(&mut fields, "power:")?;
    let lqi: u32 = tagged_value(&mut fields, "lqi:")?;
    let time: i64 = tagged_value(&mut fields, "time:")?;

    let mut psdu = decode_hex(hex_str)?;
    if psdu.len() < FCS_LEN {
        return None;
    }
    psdu.truncate(psdu.len() - FCS_LEN);

    Some(CapturedFrame {
        psdu,
        // Firmware counter is 32 bits wide; negative values are its two's complement
        device_timestamp: (time & 0xFFFF_FFFF) as u32,
        rssi,
        lqi,
    })
}

/// Consume `tag` followed by a value parsed as `T`
fn tagged_value<'a, T, I>(fields: &mut I, tag: &str) -> Option<T>
where
    T: std::str::FromStr,
    I: Iterator<Item = &'a str>,
{
    if fields.next()? != tag {
        return None;
    }
    fields.next()?.parse().ok()
}

fn decode_hex(hex_str: &str) -> Option<Vec<u8>> {
    if hex_str.is_empty() || hex_str.len() % 2 != 0 {
        return None;
    }
    hex::decode(hex_str).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let frame = parse_line("received: 4188819600ffff0212 power: -60 lqi: 200 time: 1000000")
            .expect("frame");
        assert_eq!(frame.psdu, hex::decode("4188819600ffff").unwrap());
        assert_eq!(frame.rssi, -60);
        assert_eq!(frame.lqi, 200);
        assert_eq!(frame.device_timestamp, 1_000_000);
    }

    #[test]
    fn test_parse_line_with_crlf_and_prompt() {
        let frame = parse_line("uart:~$ received: 0102AABB  power: -91 lqi: 12 time: 42\r\n")
            .expect("frame");
        assert_eq!(frame.psdu, vec![0x01, 0x02]);
        assert_eq!(frame.rssi, -91);
        assert_eq!(frame.lqi, 12);
    }

    #[test]
    fn test_parse_line_negative_time_wraps() {
        let frame = parse_line("received: 00112233 power: 0 lqi: 0 time: -1").unwrap();
        assert_eq!(frame.device_timestamp, u32::MAX);

        let frame = parse_line("received: 00112233 power: 0 lqi: 0 time: 4294967297").unwrap();
        assert_eq!(frame.device_timestamp, 1);
    }

    #[test]
    fn test_parse_line_fcs_only() {
        let frame = parse_line("received: ffff power: -20 lqi: 255 time: 5").unwrap();
        assert!(frame.psdu.is_empty());
    }

    #[test]
    fn test_parse_line_invalid() {
        assert!(parse_line("").is_none());
        assert!(parse_line("uart:~$ channel 15").is_none());
        assert!(parse_line("received:").is_none());
        assert!(parse_line("received: 418 power: -60 lqi: 200 time: 1").is_none()); // odd length
        assert!(parse_line("received: 41zz power: -60 lqi: 200 time: 1").is_none());
        assert!(parse_line("received: ff power: -60 lqi: 200 time: 1").is_none()); // shorter than FCS
        assert!(parse_line("received: 4188 power: x lqi: 200 time: 1").is_none());
        assert!(parse_line("received: 4188 power: -60 lqi: -3 time: 1").is_none());
        assert!(parse_line("received: 4188 power: -60 lqi: 200").is_none()); // truncated read
        assert!(parse_line("received: 4188 lqi: 200 power: -60 time: 1").is_none());
    }

    #[test]
    fn test_parse_line_never_panics_on_garbage() {
        let samples = [
            "received: \u{fffd}\u{fffd} power: -1 lqi: 1 time: 1",
            "received: 0000 power: 99999999999 lqi: 1 time: 1",
            "received: 0000 power: -1 lqi: 1 time: 99999999999999999999999",
            "received:received:received:",
            "\0\0\0received: 00",
        ];
        for line in samples {
            assert!(parse_line(line).is_none(), "{line:?}");
        }
    }
}
