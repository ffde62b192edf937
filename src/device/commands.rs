//! Sniffer shell commands

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::link::DeviceLink;
use crate::sniffer::Channel;

/// Terminator the firmware shell expects after each command
const COMMAND_TERMINATOR: &[u8] = b"\r\n";

/// Upper bound on draining trailing output during teardown
const DRAIN_LIMIT: Duration = Duration::from_secs(1);

/// Put the radio to sleep
pub const CMD_SLEEP: &str = "sleep";
/// Stop the shell echoing commands back onto the report stream
pub const CMD_ECHO_OFF: &str = "shell echo off";
/// Start reporting received frames
pub const CMD_RECEIVE: &str = "receive";

/// Command sequence that puts the sniffer into receive mode on `channel`
///
/// The leading empty command terminates whatever partial input the shell
/// may still hold from a previous session.
pub fn setup_commands(channel: Channel) -> Vec<String> {
    vec![
        String::new(),
        CMD_SLEEP.to_string(),
        CMD_ECHO_OFF.to_string(),
        format!("channel {}", channel),
        CMD_RECEIVE.to_string(),
    ]
}

/// Write one command line
pub fn send_command<W: Write + ?Sized>(link: &mut W, command: &str) -> io::Result<()> {
    debug!("-> {:?}", command);
    link.write_all(command.as_bytes())?;
    link.write_all(COMMAND_TERMINATOR)
}

/// Configure the sniffer and start reception
pub fn start_receiving(link: &mut dyn DeviceLink, channel: Channel) -> io::Result<()> {
    link.clear_buffers()?;
    for command in setup_commands(channel) {
        send_command(link, &command)?;
    }
    link.flush()?;
    info!("Sniffer receiving on channel {}", channel);
    Ok(())
}

/// Best-effort: put the radio to sleep and drain trailing output
///
/// Failures are logged and swallowed; the link may already be gone.
pub fn stop_receiving(link: &mut dyn DeviceLink) {
    if let Err(e) = send_command(link, CMD_SLEEP).and_then(|_| link.flush()) {
        debug!("Cannot send sleep command: {}", e);
        return;
    }

    let started = Instant::now();
    let mut drained = 0usize;
    let mut buf = [0u8; 256];
    while started.elapsed() < DRAIN_LIMIT {
        match link.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
    debug!("Drained {} trailing bytes from sniffer", drained);
}
