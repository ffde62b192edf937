//! Sniffer dongle access: serial link and shell commands

pub mod commands;
pub mod link;

pub use link::{DeviceLink, DeviceOpener, SerialConfig, SerialOpener};
