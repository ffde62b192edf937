//! Capture file wire format
//!
//! Classic little-endian pcap: a 24-byte global header followed by records of
//! a 16-byte record header and the captured bytes. With the TAP link type each
//! record starts with a 28-byte IEEE 802.15.4 TAP header carrying RSSI,
//! channel and LQI as TLVs (github.com/jkcko/ieee802.15.4-tap).

use std::time::Duration;

use pcap_file::pcap::{PcapHeader, PcapPacket};
use pcap_file::{DataLink, Endianness, TsResolution};

use crate::sniffer::{CapturedFrame, Channel, LinkType};

pub const PCAP_VERSION_MAJOR: u16 = 2;
pub const PCAP_VERSION_MINOR: u16 = 4;

/// Largest PSDU is 127 bytes, so 255 covers PSDU plus metadata
pub const PCAP_SNAPLEN: u32 = 0x0000_00FF;

pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

/// Total TAP header length: 4-byte TAP header plus three 8-byte TLVs
pub const TAP_HEADER_LEN: usize = 28;

/// TAP TLV types
pub const TLV_RSSI: u16 = 1;
pub const TLV_CHANNEL: u16 = 3;
pub const TLV_LQI: u16 = 10;

/// pcap global header for `link_type`: v2.4, microseconds, little-endian
pub fn pcap_header(link_type: LinkType) -> PcapHeader {
    PcapHeader {
        version_major: PCAP_VERSION_MAJOR,
        version_minor: PCAP_VERSION_MINOR,
        ts_correction: 0,
        ts_accuracy: 0,
        snaplen: PCAP_SNAPLEN,
        datalink: DataLink::from(link_type.number()),
        ts_resolution: TsResolution::MicroSecond,
        endianness: Endianness::Little,
    }
}

/// Encode one frame as a pcap record stamped with `host_us`
///
/// Data beyond the snapshot length is cut; the original length still counts it.
pub fn encode_record(
    frame: &CapturedFrame,
    host_us: u64,
    link_type: LinkType,
    channel: Channel,
) -> PcapPacket<'static> {
    let metadata_len = if link_type.has_metadata() { TAP_HEADER_LEN } else { 0 };

    let mut data = Vec::with_capacity(metadata_len + frame.psdu.len());
    if link_type.has_metadata() {
        push_tap_header(&mut data, frame, channel);
    }
    data.extend_from_slice(&frame.psdu);

    let orig_len = data.len() as u32;
    data.truncate(PCAP_SNAPLEN as usize);

    PcapPacket {
        timestamp: Duration::from_micros(host_us),
        orig_len,
        data: data.into(),
    }
}

fn push_tap_header(out: &mut Vec<u8>, frame: &CapturedFrame, channel: Channel) {
    // version 0, reserved 0, total header length
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(TAP_HEADER_LEN as u16).to_le_bytes());

    push_tlv_header(out, TLV_RSSI, 4);
    out.extend_from_slice(&(frame.rssi as f32).to_le_bytes());

    // channel number, page 0, one byte of padding
    push_tlv_header(out, TLV_CHANNEL, 3);
    out.extend_from_slice(&(channel.number() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    // LQI byte plus three bytes of padding
    push_tlv_header(out, TLV_LQI, 1);
    out.push(frame.lqi.min(u8::MAX as u32) as u8);
    out.extend_from_slice(&[0u8; 3]);
}

fn push_tlv_header(out: &mut Vec<u8>, tlv_type: u16, length: u16) {
    out.extend_from_slice(&tlv_type.to_le_bytes());
    out.extend_from_slice(&length.to_le_bytes());
}

/// Bytes of the global header for `link_type`
#[cfg(test)]
pub fn global_header(link_type: LinkType) -> Vec<u8> {
    pcap_file::pcap::PcapWriter::with_header(Vec::new(), pcap_header(link_type))
        .unwrap()
        .into_writer()
}

/// Bytes of one record (header and data) as written after the global header
#[cfg(test)]
pub fn record_bytes(packet: &PcapPacket<'_>, link_type: LinkType) -> Vec<u8> {
    let mut writer =
        pcap_file::pcap::PcapWriter::with_header(Vec::new(), pcap_header(link_type)).unwrap();
    writer.write_packet(packet).unwrap();
    writer.into_writer().split_off(GLOBAL_HEADER_LEN)
}
