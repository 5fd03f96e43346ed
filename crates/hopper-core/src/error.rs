//! Error types for the watcher.
//!
//! We keep errors simple and actionable. Everything that goes wrong at
//! runtime ends up here and is handed to the consumer's error channel;
//! only lifecycle and configuration misuse is returned to the caller.

use crate::state::WatcherState;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boxed error returned by consumers and notification backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience type for fallible watcher operations.
pub type Result<T> = std::result::Result<T, WatchError>;

/// Things that can go wrong while watching a directory.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The file disappeared before we could look at it.
    #[error("file not found: '{0}'")]
    NotFound(PathBuf),

    /// Start called while started, or Stop called while stopped.
    #[error("watcher is already {0}")]
    InvalidState(WatcherState),

    /// Couldn't enumerate the watched directory. Usually transient
    /// (network share dropped, directory recreated).
    #[error("failed to list directory '{path}': {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The lock probe failed for a reason other than "still locked".
    ///
    /// `FsLockProbe` never produces this; it treats any failure other than
    /// a missing file as "locked". It's here for custom `LockProbe`s that
    /// can tell the two apart, built with [`WatchError::probe`].
    #[error("failed to probe lock on '{path}': {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The consumer rejected a file.
    #[error("failed to deliver '{path}': {source}")]
    Delivery {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The timer or notification subsystem reported a problem.
    #[error("trigger failure: {0}")]
    Trigger(#[source] BoxError),

    /// The name filter isn't a valid glob.
    #[error("invalid name filter '{pattern}': {source}")]
    Filter {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The configuration is readable but doesn't make sense.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl WatchError {
    /// Maps an I/O error from probing `path`, keeping "not found" distinct.
    ///
    /// Meant for `LockProbe` implementations.
    pub fn probe(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Probe { path, source }
        }
    }

    /// Creates a listing error with the directory for context.
    pub fn listing(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Listing {
            path: path.into(),
            source,
        }
    }

    /// Creates a delivery error for a file the consumer refused.
    pub fn delivery(path: &Path, source: impl Into<BoxError>) -> Self {
        Self::Delivery {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error means the file is simply gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
