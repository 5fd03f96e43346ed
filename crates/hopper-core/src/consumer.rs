//! The downstream side of the watcher.
//!
//! Whatever reads, parses and moves files implements `FileConsumer`.
//! The watcher calls it once per file that has arrived and is no longer
//! locked, and routes every runtime problem to `on_error`.

use crate::error::{BoxError, WatchError};
use std::path::Path;
use tracing::warn;

/// Receives files that are ready to be consumed.
///
/// Calls come from the watcher's background tasks, sometimes while the
/// watcher's lifecycle lock is held. Implementations must not call back
/// into the watcher (`start`, `stop`, `request_scan`) from these methods.
pub trait FileConsumer: Send + Sync {
    /// A file has arrived and nobody is writing to it anymore.
    ///
    /// Returning an error doesn't stop the watcher; the error is passed
    /// to `on_error` tagged with the path.
    fn on_available(&self, path: &Path) -> Result<(), BoxError>;

    /// Something went wrong. `path` is set when the failure concerns a
    /// single file.
    fn on_error(&self, error: &WatchError, path: Option<&Path>) {
        match path {
            Some(path) => warn!(path = %path.display(), "{}", error),
            None => warn!("{}", error),
        }
    }
}

impl<F> FileConsumer for F
where
    F: Fn(&Path) -> Result<(), BoxError> + Send + Sync,
{
    fn on_available(&self, path: &Path) -> Result<(), BoxError> {
        self(path)
    }
}
