//! Extcap control pipes
//!
//! Wireshark passes two FIFOs. Control-in carries toolbar messages framed as
//! `'T'`, a 24-bit big-endian length, control number, command and payload;
//! this bridge has no toolbar, so messages are only counted. The pipe's real
//! job is liveness: once it fails, Wireshark is gone. Control-out is held
//! open for the lifetime of the capture and never written.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use super::event::{ControlEvent, SessionEvent, TerminationEvent};
use crate::fifo::{self, PIPE_POLL_INTERVAL};

/// Sync byte that starts every control message
const CONTROL_SYNC: u8 = b'T';

/// Sync byte plus 3-byte length plus control number plus command
const CONTROL_HEADER_LEN: usize = 6;

pub const CONSUMER_DISCONNECTED: &str = "consumer disconnected";

/// Read one framed control message
pub fn read_control_message<R: Read>(reader: &mut R) -> io::Result<ControlEvent> {
    let mut header = [0u8; CONTROL_HEADER_LEN];
    reader.read_exact(&mut header)?;

    if header[0] != CONTROL_SYNC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad control sync byte 0x{:02x}", header[0]),
        ));
    }

    // Length counts the control number and command bytes too
    let length = u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize;
    let mut payload = vec![0u8; length.saturating_sub(2)];
    reader.read_exact(&mut payload)?;

    Ok(ControlEvent {
        control: header[4],
        command: header[5],
        payload,
    })
}

/// Control-in pipe that gives up once the capture stops
///
/// Reads poll the pipe, so a silent peer never keeps a stopping session
/// waiting for longer than one poll interval.
struct ControlPipe {
    file: File,
    running: Arc<AtomicBool>,
}

impl Read for ControlPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "capture stopping"));
            }
            if !fifo::wait_readable(&self.file, PIPE_POLL_INTERVAL)? {
                continue;
            }
            match self.file.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                result => return result,
            }
        }
    }
}

/// Control-in reader loop (runs in the `control-reader` thread)
pub fn run_control_reader(path: PathBuf, events: Sender<SessionEvent>, running: Arc<AtomicBool>) {
    match fifo::open_reader(&path) {
        Ok(file) => {
            let mut pipe = ControlPipe {
                file,
                running: running.clone(),
            };
            loop {
                match read_control_message(&mut pipe) {
                    Ok(message) => {
                        if events.send(SessionEvent::Control(message)).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::ConnectionAborted => {
                        debug!("Control reader stopped");
                        return;
                    }
                    Err(e) => {
                        debug!("Control pipe closed: {}", e);
                        break;
                    }
                }
            }
        }
        Err(e) => warn!("Cannot open control pipe {}: {}", path.display(), e),
    }

    let _ = events.send(SessionEvent::Terminate(TerminationEvent::failure(
        CONSUMER_DISCONNECTED,
    )));
}

/// Control-out holder loop (runs in the `control-writer` thread)
pub fn run_control_writer(path: PathBuf, running: Arc<AtomicBool>) {
    let _pipe = match fifo::open_writer(&path, || running.load(Ordering::SeqCst)) {
        Ok(Some(pipe)) => pipe,
        Ok(None) => return,
        Err(e) => {
            warn!("Cannot open control pipe {}: {}", path.display(), e);
            return;
        }
    };

    while running.load(Ordering::SeqCst) {
        thread::sleep(PIPE_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[test]
    fn test_read_control_message() {
        let mut pipe = Cursor::new(vec![b'T', 0, 0, 5, 0, 1, b'a', b'b', b'c']);
        let message = read_control_message(&mut pipe).unwrap();
        assert_eq!(message.control, 0);
        assert_eq!(message.command, 1);
        assert_eq!(message.payload, b"abc");
    }

    #[test]
    fn test_read_control_message_without_payload() {
        let mut pipe = Cursor::new(vec![b'T', 0, 0, 2, 3, 0]);
        let message = read_control_message(&mut pipe).unwrap();
        assert_eq!(message.control, 3);
        assert!(message.payload.is_empty());
    }

    #[test]
    fn test_read_control_message_errors() {
        let mut bad_sync = Cursor::new(vec![b'X', 0, 0, 2, 0, 0]);
        assert_eq!(
            read_control_message(&mut bad_sync).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );

        let mut truncated = Cursor::new(vec![b'T', 0, 0, 9, 0, 1, b'a']);
        assert_eq!(
            read_control_message(&mut truncated).unwrap_err().kind(),
            io::ErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn test_control_reader_reports_disconnect() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[b'T', 0, 0, 3, 0, 2, 0x42]).unwrap();

        let (tx, rx) = unbounded();
        run_control_reader(file.path().to_path_buf(), tx, running());
        let events: Vec<SessionEvent> = rx.try_iter().collect();

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], SessionEvent::Control(m) if m.payload == [0x42]));
        assert!(matches!(
            &events[1],
            SessionEvent::Terminate(t) if t.reason == CONSUMER_DISCONNECTED
        ));
    }

    #[test]
    fn test_control_reader_missing_pipe() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        run_control_reader(dir.path().join("missing"), tx, running());
        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Terminate(_))));
    }

    #[test]
    fn test_control_writer_releases_on_stop() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let running = Arc::new(AtomicBool::new(false));
        // Already stopped: opens, sees the flag and returns
        run_control_writer(file.path().to_path_buf(), running);
    }

    #[cfg(unix)]
    #[test]
    fn test_control_reader_leaves_silent_pipe_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl_in");
        fifo::make_fifo(&path);

        let running = running();
        let (tx, rx) = unbounded();
        let reader = {
            let (path, running) = (path.clone(), running.clone());
            thread::spawn(move || run_control_reader(path, tx, running))
        };

        // Peer opens its end and stays silent
        thread::sleep(Duration::from_millis(50));
        let _peer = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        thread::sleep(Duration::from_millis(150));

        let started = Instant::now();
        running.store(false, Ordering::SeqCst);
        reader.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_control_writer_stops_while_waiting_for_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl_out");
        fifo::make_fifo(&path);

        let running = running();
        let writer = {
            let (path, running) = (path.clone(), running.clone());
            thread::spawn(move || run_control_writer(path, running))
        };

        thread::sleep(Duration::from_millis(150));
        let started = Instant::now();
        running.store(false, Ordering::SeqCst);
        writer.join().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
