//! Serial reader worker
//!
//! Owns the device link while capturing: splits the byte stream into lines,
//! parses frame reports and posts them to the consumer. The link is handed
//! back when the worker exits so teardown can reuse it.

use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, info, trace};

use super::event::{SessionEvent, TerminationEvent};
use super::state::SessionStats;
use crate::device::DeviceLink;
use crate::sniffer::parse_line;

/// Main read loop (runs in the `serial-reader` thread)
pub fn run_serial_reader(
    link: Box<dyn DeviceLink>,
    events: Sender<SessionEvent>,
    running: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
) -> Box<dyn DeviceLink> {
    let mut reader = BufReader::new(link);
    let mut line = Vec::with_capacity(256);
    let mut first_frame = true;

    let failure = loop {
        if !running.load(Ordering::SeqCst) {
            break None;
        }

        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break Some("sniffer device disconnected (end of stream)".to_string()),
            Ok(_) => {
                // Without a newline the stream ended mid-line; the next read reports it
                if line.last() != Some(&b'\n') {
                    continue;
                }

                let text = String::from_utf8_lossy(&line);
                match parse_line(&text) {
                    Some(frame) => {
                        if first_frame {
                            info!("First frame received from sniffer");
                            first_frame = false;
                        }
                        stats.record_frame();
                        if events.send(SessionEvent::Frame(frame)).is_err() {
                            debug!("Event channel closed, stopping serial reader");
                            break None;
                        }
                    }
                    None => {
                        if !text.trim().is_empty() {
                            stats.record_discarded();
                            trace!("Ignoring sniffer output: {}", text.trim_end());
                        }
                    }
                }
                line.clear();
            }
            // Read timeouts only give the stop flag a chance to be seen
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Err(e) => break Some(format!("cannot read from sniffer device: {}", e)),
        }
    };

    if let Some(reason) = failure {
        let _ = events.send(SessionEvent::Terminate(TerminationEvent::failure(reason)));
    }

    reader.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::link::{LinkEnd, ScriptedLink};
    use crossbeam_channel::unbounded;

    fn run_to_end(link: ScriptedLink) -> (Vec<SessionEvent>, Arc<SessionStats>) {
        let (tx, rx) = unbounded();
        let stats = Arc::new(SessionStats::new());
        run_serial_reader(Box::new(link), tx, Arc::new(AtomicBool::new(true)), stats.clone());
        (rx.try_iter().collect(), stats)
    }

    #[test]
    fn test_frames_then_disconnect() {
        let link = ScriptedLink::new(
            &[
                "uart:~$ shell echo off\r\n",
                "received: 4188819600ffff0212 power: -60 lqi: 200 time: 1000000\r\n",
                "received: 41888196",
                "00ffff0212 power: -61 lqi: 201 time: 1000500\r\n",
            ],
            LinkEnd::Disconnect,
        );
        let (events, stats) = run_to_end(link);

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], SessionEvent::Frame(f) if f.rssi == -60));
        assert!(matches!(&events[1], SessionEvent::Frame(f) if f.lqi == 201));
        match &events[2] {
            SessionEvent::Terminate(t) => assert!(t.reason.contains("device unplugged")),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(stats.get_frames(), 2);
        assert_eq!(stats.get_discarded(), 1);
    }

    #[test]
    fn test_partial_line_at_eof_is_dropped() {
        let link = ScriptedLink::new(
            &["received: 4188819600ffff0212 power: -60 lqi: 200 time: 1"],
            LinkEnd::Eof,
        );
        let (events, stats) = run_to_end(link);

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SessionEvent::Terminate(t) if !t.is_requested()));
        assert_eq!(stats.get_frames(), 0);
    }

    #[test]
    fn test_stop_flag_ends_idle_reader_quietly() {
        let (tx, rx) = unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let stopper = running.clone();
        let handle = std::thread::spawn(move || {
            run_serial_reader(
                Box::new(ScriptedLink::new(&[], LinkEnd::Idle)),
                tx,
                running,
                Arc::new(SessionStats::new()),
            )
        });

        std::thread::sleep(std::time::Duration::from_millis(30));
        stopper.store(false, Ordering::SeqCst);
        handle.join().unwrap();
        assert!(rx.try_iter().next().is_none());
    }
}
