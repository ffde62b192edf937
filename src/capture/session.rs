//! Capture session - runs the sniffer, the workers and the record consumer
//!
//! The calling thread is the consumer: it owns the clock translator and the
//! output sink and handles one event at a time. Workers only ever talk to it
//! through the event channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use super::control::{run_control_reader, run_control_writer};
use super::event::{SessionEvent, TerminationEvent};
use super::reader::run_serial_reader;
use super::state::{CaptureSummary, SessionState, SessionStats};
use super::worker::{Worker, WORKER_JOIN_TIMEOUT};
use crate::device::commands::{start_receiving, stop_receiving};
use crate::device::{DeviceLink, DeviceOpener};
use crate::error::SessionError;
use crate::pcap::{encode_record, OutputSink, OutputTarget};
use crate::sniffer::{Channel, ClockTranslator, LinkType, MetadataMode};

/// Everything a session needs, validated
#[derive(Debug)]
pub struct SessionConfig {
    /// Serial device path of the sniffer dongle
    pub device: String,
    pub channel: Channel,
    pub metadata: MetadataMode,
    pub output: OutputTarget,
    pub control_in: Option<PathBuf>,
    pub control_out: Option<PathBuf>,
    /// Delay before the device is opened, lets a freshly enumerated dongle settle
    pub settle_delay: Duration,
}

/// Thread-safe stop trigger for a running session
///
/// Only the first call posts a termination; later calls do nothing.
#[derive(Debug, Clone)]
pub struct StopHandle {
    events: Sender<SessionEvent>,
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            debug!("Stop already requested");
            return;
        }
        let _ = self
            .events
            .send(SessionEvent::Terminate(TerminationEvent::requested()));
    }
}

/// Workers running during `capturing`
struct Workers {
    serial: Option<Worker<Box<dyn DeviceLink>>>,
    control: Vec<Worker<()>>,
}

/// One capture from start to teardown; not reusable once stopped
pub struct CaptureSession {
    device: String,
    channel: Channel,
    link_type: LinkType,
    output: Option<OutputTarget>,
    control_in: Option<PathBuf>,
    control_out: Option<PathBuf>,
    settle_delay: Duration,
    opener: Box<dyn DeviceOpener>,
    state: SessionState,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    stop_requested: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig, opener: Box<dyn DeviceOpener>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            device: config.device,
            channel: config.channel,
            link_type: config.metadata.link_type(),
            output: Some(config.output),
            control_in: config.control_in,
            control_out: config.control_out,
            settle_delay: config.settle_delay,
            opener,
            state: SessionState::Idle,
            events_tx,
            events_rx,
            stop_requested: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SessionStats::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            events: self.events_tx.clone(),
            requested: self.stop_requested.clone(),
        }
    }

    /// Stop a session that is not running; a stopped session is left as is
    #[cfg(test)]
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Stopped => debug!("Asked to stop {} while already stopped", self.device),
            SessionState::Idle => self.transition(SessionState::Stopped),
            // `run` holds `&mut self` through every other state
            _ => self.stop_handle().stop(),
        }
    }

    /// Run the whole lifecycle on the calling thread, blocking until stopped
    pub fn run(&mut self) -> Result<CaptureSummary, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::NotReusable);
        }

        info!(
            "Starting capture on {} channel {} ({})",
            self.device,
            self.channel,
            self.link_type.description()
        );
        self.transition(SessionState::Starting);

        let link = self.start_device()?;
        self.transition(SessionState::Capturing);

        let output = self.output.take().ok_or(SessionError::NotReusable)?;
        let stop_requested = self.stop_requested.clone();
        let mut sink = match OutputSink::open(output, self.link_type, || {
            !stop_requested.load(Ordering::SeqCst)
        }) {
            Ok(Some(sink)) => sink,
            Ok(None) => {
                info!("Stopped before the capture output was opened");
                self.shutdown(Workers::idle(), Some(link));
                return Ok(self.summary(0, TerminationEvent::requested()));
            }
            Err(source) => {
                error!("Cannot open capture output: {}", source);
                self.shutdown(Workers::idle(), Some(link));
                return Err(SessionError::Output { source });
            }
        };

        self.running.store(true, Ordering::SeqCst);
        let workers = match self.spawn_workers(link) {
            Ok(workers) => workers,
            Err((workers, source)) => {
                self.shutdown(workers, None);
                return Err(SessionError::Spawn(source));
            }
        };

        let termination = self.consume(&mut sink);
        if !termination.is_requested() {
            error!("Capture stopped: {}", termination.reason);
        }

        self.shutdown(workers, None);
        Ok(self.summary(sink.records_written(), termination))
    }

    fn summary(&self, records_written: u64, termination: TerminationEvent) -> CaptureSummary {
        let summary = CaptureSummary {
            records_written,
            frames_received: self.stats.get_frames(),
            lines_discarded: self.stats.get_discarded(),
            reason: termination.reason,
        };
        info!(
            "Capture finished. Records: {}, frames: {}, discarded lines: {}, control messages: {}",
            summary.records_written,
            summary.frames_received,
            summary.lines_discarded,
            self.stats.get_control()
        );
        summary
    }

    /// `starting`: open the dongle and put it into receive mode
    fn start_device(&mut self) -> Result<Box<dyn DeviceLink>, SessionError> {
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }

        let mut link = match self.opener.open(&self.device) {
            Ok(link) => link,
            Err(source) => return Err(self.abort_start(None, source)),
        };

        match start_receiving(link.as_mut(), self.channel) {
            Ok(()) => Ok(link),
            Err(source) => Err(self.abort_start(Some(link), source)),
        }
    }

    fn abort_start(&mut self, link: Option<Box<dyn DeviceLink>>, source: std::io::Error) -> SessionError {
        error!(
            "{} did not accept setup commands. Is it flashed with the sniffer firmware? ({})",
            self.device, source
        );
        self.shutdown(Workers::idle(), link);
        SessionError::Setup {
            device: self.device.clone(),
            source,
        }
    }

    fn spawn_workers(
        &self,
        link: Box<dyn DeviceLink>,
    ) -> Result<Workers, (Workers, std::io::Error)> {
        let mut workers = Workers::idle();

        let (events, running, stats) = (self.events_tx.clone(), self.running.clone(), self.stats.clone());
        match Worker::spawn("serial-reader", move || run_serial_reader(link, events, running, stats)) {
            Ok(worker) => workers.serial = Some(worker),
            Err(e) => return Err((workers, e)),
        }

        if let Some(path) = self.control_in.clone() {
            let (events, running) = (self.events_tx.clone(), self.running.clone());
            match Worker::spawn("control-reader", move || run_control_reader(path, events, running)) {
                Ok(worker) => workers.control.push(worker),
                Err(e) => return Err((workers, e)),
            }
        }

        if let Some(path) = self.control_out.clone() {
            let running = self.running.clone();
            match Worker::spawn("control-writer", move || run_control_writer(path, running)) {
                Ok(worker) => workers.control.push(worker),
                Err(e) => return Err((workers, e)),
            }
        }

        Ok(workers)
    }

    /// `capturing`: route events until the first termination
    fn consume(&mut self, sink: &mut OutputSink) -> TerminationEvent {
        let mut clock = ClockTranslator::new();

        loop {
            let event = match self.events_rx.recv() {
                Ok(event) => event,
                // The session keeps a sender, so this only happens if it was dropped
                Err(_) => return TerminationEvent::failure("event channel closed"),
            };

            match event {
                SessionEvent::Frame(frame) => {
                    let host_us = clock.correct(frame.device_timestamp);
                    let record = encode_record(&frame, host_us, self.link_type, self.channel);
                    if let Err(e) = sink.write_record(&record) {
                        return TerminationEvent::failure(format!("capture output closed: {}", e));
                    }
                }
                SessionEvent::Control(message) => {
                    self.stats.record_control();
                    debug!(
                        "Control message for control {} (command {}, {} bytes) ignored",
                        message.control,
                        message.command,
                        message.payload.len()
                    );
                }
                SessionEvent::Terminate(termination) => return termination,
            }
        }
    }

    /// `stopping`: stop workers, put the dongle to sleep, release it
    fn shutdown(&mut self, workers: Workers, link: Option<Box<dyn DeviceLink>>) {
        self.transition(SessionState::Stopping);
        self.running.store(false, Ordering::SeqCst);

        let mut link = link;
        if let Some(serial) = workers.serial {
            link = serial.join_timeout(WORKER_JOIN_TIMEOUT);
            if link.is_none() {
                warn!("Serial link not returned by reader; skipping sniffer teardown");
            }
        }

        if let Some(mut link) = link {
            stop_receiving(link.as_mut());
            debug!("Released {}", self.device);
        }

        for worker in workers.control {
            worker.join_timeout(WORKER_JOIN_TIMEOUT);
        }

        self.transition(SessionState::Stopped);
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
    }
}

impl Workers {
    fn idle() -> Self {
        Self {
            serial: None,
            control: Vec::new(),
        }
    }
}
