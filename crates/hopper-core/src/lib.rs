//! Hopper Core - the building blocks of the directory watcher
//!
//! This crate holds everything that doesn't need a runtime:
//! - Probing whether a file is still locked by its producer
//! - Listing a directory and diffing it against the last snapshot
//! - The consumer trait files are delivered to
//! - Configuration and the shared error type
//!
//! # Example
//!
//! ```no_run
//! use hopper_core::{diff, list_directory, FsLockProbe, LockProbe, WatchTarget};
//!
//! let target = WatchTarget::new("/data/inbox");
//! let listing = list_directory(&target).unwrap();
//! for path in diff(None, &listing, false) {
//!     let locked = FsLockProbe.is_locked(&path).unwrap();
//!     println!("{} locked={}", path.display(), locked);
//! }
//! ```

pub mod config;
pub mod consumer;
pub mod detect;
pub mod error;
pub mod listing;
pub mod probe;
pub mod state;
pub mod target;

pub use config::{TriggerMode, WatchConfig};
pub use consumer::FileConsumer;
pub use detect::{diff, Snapshot};
pub use error::{BoxError, Result, WatchError};
pub use listing::list_directory;
pub use probe::{FsLockProbe, LockProbe};
pub use state::WatcherState;
pub use target::{NameFilter, WatchTarget};
