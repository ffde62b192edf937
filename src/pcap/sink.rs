//! Streaming capture output (Wireshark FIFO, file or stdout)

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use pcap_file::pcap::{PcapPacket, PcapWriter};
use pcap_file::PcapError;
use tracing::{debug, info};

use super::format::pcap_header;
use crate::fifo;
use crate::sniffer::LinkType;

/// Where capture records are written
pub enum OutputTarget {
    /// FIFO or regular file, opened for writing once
    Path(PathBuf),
    /// Process stdout
    Stdout,
    /// Caller supplied writer
    #[cfg(test)]
    Writer(Box<dyn Write + Send>),
}

impl fmt::Debug for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Stdout => f.write_str("Stdout"),
            #[cfg(test)]
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl OutputTarget {
    /// Interpret the `--fifo` argument; `-` means stdout
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdout
        } else {
            Self::Path(PathBuf::from(arg))
        }
    }
}

/// Writes the pcap global header once, then one record per frame
pub struct OutputSink {
    writer: PcapWriter<BufWriter<Box<dyn Write + Send>>>,
    records_written: u64,
}

impl OutputSink {
    /// Open the destination and emit the global header
    ///
    /// A FIFO is only open once Wireshark opens its reading side; until then
    /// `keep_waiting` is polled and `Ok(None)` returned once it says stop.
    pub fn open(
        target: OutputTarget,
        link_type: LinkType,
        keep_waiting: impl Fn() -> bool,
    ) -> io::Result<Option<Self>> {
        let writer: Box<dyn Write + Send> = match target {
            OutputTarget::Path(path) => {
                debug!("Opening capture output {}", path.display());
                match fifo::open_writer(&path, keep_waiting)? {
                    Some(file) => Box::new(file),
                    None => {
                        debug!("Gave up waiting for a reader on {}", path.display());
                        return Ok(None);
                    }
                }
            }
            OutputTarget::Stdout => Box::new(io::stdout()),
            #[cfg(test)]
            OutputTarget::Writer(writer) => writer,
        };

        let mut writer =
            PcapWriter::with_header(BufWriter::new(writer), pcap_header(link_type)).map_err(into_io)?;
        writer.get_mut().flush()?;

        info!("Capture output ready ({}, link type {})", link_type.name(), link_type.number());
        Ok(Some(Self {
            writer,
            records_written: 0,
        }))
    }

    /// Write one record and flush it through
    pub fn write_record(&mut self, packet: &PcapPacket<'_>) -> io::Result<()> {
        self.writer.write_packet(packet).map_err(into_io)?;
        self.writer.get_mut().flush()?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

fn into_io(e: PcapError) -> io::Error {
    match e {
        PcapError::IoError(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// In-memory writer shared between a sink and a test
#[cfg(test)]
#[derive(Clone, Default)]
pub struct SharedBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(test)]
impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
