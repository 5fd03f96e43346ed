//! Hopper Watcher - start/stop directory watching
//!
//! This crate runs the moving parts on top of `hopper-core`:
//! - A scan loop that owns the snapshot and delivers new files
//! - Background retry workers for files that are still being written
//! - Polling and realtime (OS notification) triggers
//! - A start/stop lifecycle that never lets a stale callback through
//!
//! Everything runs on the caller's tokio runtime.

mod deliver;
mod gate;
mod lifecycle;
mod monitor;
mod scan;
mod trigger;
mod wake;

#[cfg(test)]
mod test_support;

pub use lifecycle::DirectoryWatcher;
pub use monitor::DEFAULT_RETRY_INTERVAL;
pub use trigger::{TriggerConfig, DEFAULT_INTERVAL};
