//! Named pipe helpers
//!
//! Opening a FIFO normally blocks until the peer opens the other end, and a
//! read blocks until the peer writes. Both would keep a stopping capture
//! waiting on Wireshark, so pipes are opened non-blocking and polled with a
//! short timeout instead.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// How long a single wait on a pipe lasts before the caller rechecks its stop flag
pub const PIPE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Open `path` for reading without waiting for a writer
pub fn open_reader(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);
    nonblocking(&mut options);
    options.open(path)
}

/// Open `path` for writing, creating a regular file if it does not exist
///
/// On a FIFO this waits for a reader, checking `keep_waiting` between
/// attempts; `Ok(None)` means the wait was abandoned. The returned file is
/// in blocking mode.
pub fn open_writer(path: &Path, keep_waiting: impl Fn() -> bool) -> io::Result<Option<File>> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    nonblocking(&mut options);

    loop {
        match options.open(path) {
            Ok(file) => {
                set_blocking(&file)?;
                return Ok(Some(file));
            }
            Err(e) if no_reader_yet(&e) => {
                if !keep_waiting() {
                    return Ok(None);
                }
                thread::sleep(PIPE_POLL_INTERVAL);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Wait up to `timeout` for `file` to become readable (data or hangup)
#[cfg(unix)]
pub fn wait_readable(file: &File, timeout: Duration) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let mut poll_fd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    // SAFETY: one valid pollfd, count matches
    let ready = unsafe { libc::poll(&mut poll_fd, 1, timeout_ms) };
    if ready < 0 {
        let e = io::Error::last_os_error();
        if e.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(e);
    }
    Ok(ready > 0)
}

#[cfg(not(unix))]
pub fn wait_readable(_file: &File, _timeout: Duration) -> io::Result<bool> {
    Ok(true)
}

#[cfg(unix)]
fn nonblocking(options: &mut OpenOptions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.custom_flags(libc::O_NONBLOCK);
}

#[cfg(not(unix))]
fn nonblocking(_options: &mut OpenOptions) {}

#[cfg(unix)]
fn set_blocking(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: fcntl on a descriptor owned by `file`
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_blocking(_file: &File) -> io::Result<()> {
    Ok(())
}

/// Non-blocking write open of a FIFO nobody reads yet
#[cfg(unix)]
fn no_reader_yet(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ENXIO)
}

#[cfg(not(unix))]
fn no_reader_yet(_e: &io::Error) -> bool {
    false
}

/// Create a FIFO at `path`
#[cfg(all(test, unix))]
pub fn make_fifo(path: &Path) {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
    // SAFETY: valid NUL-terminated path
    assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0, "mkfifo failed");
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_reader_opens_without_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl_in");
        make_fifo(&path);

        let started = Instant::now();
        let file = open_reader(&path).unwrap();
        assert!(!wait_readable(&file, Duration::from_millis(50)).unwrap());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_reader_sees_data_then_hangup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctrl_in");
        make_fifo(&path);

        let mut file = open_reader(&path).unwrap();
        let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
        writer.write_all(b"T").unwrap();
        drop(writer);

        assert!(wait_readable(&file, Duration::from_secs(1)).unwrap());
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).unwrap(), 1);
        assert!(wait_readable(&file, Duration::from_secs(1)).unwrap());
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_writer_gives_up_without_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture");
        make_fifo(&path);

        let waiting = Arc::new(AtomicBool::new(true));
        let flag = waiting.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(250));
            flag.store(false, Ordering::SeqCst);
        });

        let started = Instant::now();
        let opened = open_writer(&path, || waiting.load(Ordering::SeqCst)).unwrap();
        stopper.join().unwrap();

        assert!(opened.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_writer_opens_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.pcap");
        std::fs::write(&path, b"old").unwrap();

        let mut file = open_writer(&path, || false).unwrap().unwrap();
        file.write_all(b"new capture").unwrap();
        drop(file);
        assert_eq!(std::fs::read(&path).unwrap(), b"new capture");
    }
}
