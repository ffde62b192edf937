//! Serial link to the sniffer dongle

use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info};

/// Read timeout on the device link; bounds how long a reader ignores a stop request
pub const LINK_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A byte stream to the sniffer firmware's shell
pub trait DeviceLink: Read + Write + Send {
    /// Discard anything buffered in either direction
    fn clear_buffers(&mut self) -> io::Result<()>;
}

impl DeviceLink for Box<dyn SerialPort> {
    fn clear_buffers(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

/// Opens device links by path
pub trait DeviceOpener: Send {
    fn open(&self, device: &str) -> io::Result<Box<dyn DeviceLink>>;
}

/// Serial port settings
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Ignored by the USB CDC firmware, but required to open the port
    pub baud_rate: u32,
    /// Keep retrying a failed open until this much time has passed
    pub open_timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            open_timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(200),
        }
    }
}

/// Opens real serial ports via `serialport`
#[derive(Debug, Clone, Default)]
pub struct SerialOpener {
    config: SerialConfig,
}

impl SerialOpener {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

impl DeviceOpener for SerialOpener {
    fn open(&self, device: &str) -> io::Result<Box<dyn DeviceLink>> {
        let started = Instant::now();
        loop {
            let result = serialport::new(device, self.config.baud_rate)
                .timeout(LINK_READ_TIMEOUT)
                .open();

            match result {
                Ok(port) => {
                    info!("Opened {} at {} baud", device, self.config.baud_rate);
                    return Ok(Box::new(port));
                }
                Err(e) if started.elapsed() < self.config.open_timeout => {
                    debug!("Cannot open {} yet ({}), retrying", device, e);
                    thread::sleep(self.config.retry_interval);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// How a [`ScriptedLink`] behaves once its scripted input runs out
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEnd {
    /// Reads keep timing out, like an idle radio
    Idle,
    /// Reads return 0 bytes
    Eof,
    /// Reads fail, like an unplugged dongle
    Disconnect,
}

/// Scripted in-memory device used by session tests
#[cfg(test)]
pub struct ScriptedLink {
    chunks: std::collections::VecDeque<Vec<u8>>,
    end: LinkEnd,
    fail_writes: bool,
    written: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[cfg(test)]
impl ScriptedLink {
    pub fn new(lines: &[&str], end: LinkEnd) -> Self {
        Self {
            chunks: lines.iter().map(|l| l.as_bytes().to_vec()).collect(),
            end,
            fail_writes: false,
            written: Default::default(),
        }
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Everything the session wrote to the device, shared with the link
    pub fn written(&self) -> std::sync::Arc<std::sync::Mutex<Vec<u8>>> {
        self.written.clone()
    }
}

#[cfg(test)]
impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(mut chunk) = self.chunks.pop_front() {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.chunks.push_front(chunk.split_off(n));
            }
            return Ok(n);
        }
        match self.end {
            LinkEnd::Idle => {
                thread::sleep(Duration::from_millis(5));
                Err(io::ErrorKind::TimedOut.into())
            }
            LinkEnd::Eof => Ok(0),
            LinkEnd::Disconnect => Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged")),
        }
    }
}

#[cfg(test)]
impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
impl DeviceLink for ScriptedLink {
    fn clear_buffers(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Hands out one pre-built link
#[cfg(test)]
pub struct ScriptedOpener(std::sync::Mutex<Option<ScriptedLink>>);

#[cfg(test)]
impl ScriptedOpener {
    pub fn new(link: ScriptedLink) -> Self {
        Self(std::sync::Mutex::new(Some(link)))
    }
}

#[cfg(test)]
impl DeviceOpener for ScriptedOpener {
    fn open(&self, _device: &str) -> io::Result<Box<dyn DeviceLink>> {
        match self.0.lock().unwrap().take() {
            Some(link) => Ok(Box::new(link)),
            None => Err(io::ErrorKind::NotFound.into()),
        }
    }
}
