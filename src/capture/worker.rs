//! Named worker threads with bounded joins

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use tracing::{debug, error, warn};

/// How long `stopping` waits for each worker
pub const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A running worker thread
pub struct Worker<T> {
    name: String,
    handle: JoinHandle<T>,
    /// Disconnects when the worker's closure returns or unwinds
    done: Receiver<()>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn spawn<F>(name: &str, work: F) -> io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (done_tx, done_rx) = bounded::<()>(0);
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let _done = done_tx;
            work()
        })?;

        debug!("Started worker {}", name);
        Ok(Self {
            name: name.to_string(),
            handle,
            done: done_rx,
        })
    }

    /// Wait up to `timeout` for the worker to finish
    ///
    /// A worker still running after the timeout is detached and `None` is
    /// returned; so is the result of a worker that panicked.
    pub fn join_timeout(self, timeout: Duration) -> Option<T> {
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match self.handle.join() {
                Ok(value) => {
                    debug!("Worker {} stopped", self.name);
                    Some(value)
                }
                Err(_) => {
                    error!("Worker {} panicked", self.name);
                    None
                }
            },
            Err(RecvTimeoutError::Timeout) => {
                warn!("Failed to stop worker {} within {:?}", self.name, timeout);
                None
            }
        }
    }

    #[cfg(test)]
    pub fn name(&self) -> &str {
        &self.name
    }
}
