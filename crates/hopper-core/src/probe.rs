//! Lock probing.
//!
//! A file that another process still holds open for writing shouldn't be
//! handed downstream yet. We find out by trying to take exclusive access
//! ourselves: if that fails, somebody else has it.

use crate::error::{Result, WatchError};
use std::fs::File;
use std::io;
use std::path::Path;

/// Reports whether a file is still held by its producer.
///
/// Implementations must return `WatchError::NotFound` when the file is
/// gone, so callers can tell a vanished file from a failed probe.
pub trait LockProbe: Send + Sync {
    /// Returns `Ok(true)` while another process holds the file.
    fn is_locked(&self, path: &Path) -> Result<bool>;
}

/// Probes the real filesystem.
///
/// On unix this takes a non-blocking `flock(LOCK_EX)` and releases it by
/// closing the descriptor. On windows it opens the file with share mode 0,
/// which fails while any other handle is open.
///
/// `flock` is advisory: on unix a producer only shows up as locked if it
/// takes a `flock` of its own while writing. One that writes through a
/// plain `open()` is reported as unlocked straight away. For producers like
/// that, plug in a probe that knows their convention (marker files, size
/// settling, a rename on completion) with `DirectoryWatcher::with_probe`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLockProbe;

impl LockProbe for FsLockProbe {
    fn is_locked(&self, path: &Path) -> Result<bool> {
        match open_exclusive(path) {
            Ok(_file) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(WatchError::probe(path, e)),
            // Anything else: assume the producer still has it
            Err(_) => Ok(true),
        }
    }
}

#[cfg(unix)]
fn open_exclusive(path: &Path) -> io::Result<File> {
    use std::os::unix::io::AsRawFd;

    let file = File::open(path)?;
    loop {
        // SAFETY: flock is safe on a valid file descriptor
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            // Closing the descriptor drops the lock
            return Ok(file);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

#[cfg(windows)]
fn open_exclusive(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    std::fs::OpenOptions::new()
        .read(true)
        .share_mode(0)
        .open(path)
}

#[cfg(not(any(unix, windows)))]
fn open_exclusive(path: &Path) -> io::Result<File> {
    File::open(path)
}
