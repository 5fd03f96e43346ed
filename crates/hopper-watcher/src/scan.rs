//! The scan loop.
//!
//! One task per session owns the directory snapshot. Each time it's woken
//! it lists the directory, works out what's new, delivers the files that
//! are ready and hands the locked ones to the retry monitor.
//!
//! Listing, probing and delivery are all blocking, so each scan runs on
//! tokio's blocking pool and the loop just awaits it.

use crate::deliver::deliver;
use crate::monitor::LockedFileMonitor;
use crate::wake::WakeSignal;
use hopper_core::{diff, list_directory, FileConsumer, LockProbe, Snapshot, WatchTarget};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a single scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ScanReport {
    /// Files in the directory listing.
    pub listed: usize,
    /// New files handed to the consumer straight away.
    pub delivered: usize,
    /// New files left to the retry monitor.
    pub locked: Vec<PathBuf>,
}

pub(crate) struct WatchLoop {
    target: WatchTarget,
    probe: Arc<dyn LockProbe>,
    consumer: Arc<dyn FileConsumer>,
    monitor: LockedFileMonitor,
    wake: Arc<WakeSignal>,
    scope: CancellationToken,
    snapshot: Option<Snapshot>,
    scans: Arc<AtomicU64>,
}

impl WatchLoop {
    pub(crate) fn new(
        target: WatchTarget,
        probe: Arc<dyn LockProbe>,
        consumer: Arc<dyn FileConsumer>,
        monitor: LockedFileMonitor,
        wake: Arc<WakeSignal>,
        scope: CancellationToken,
        scans: Arc<AtomicU64>,
    ) -> Self {
        Self {
            target,
            probe,
            consumer,
            monitor,
            wake,
            scope,
            snapshot: None,
            scans,
        }
    }

    /// Scans on every wake until the session is cancelled.
    pub(crate) async fn run(mut self) {
        info!(dir = %self.target.dir().display(), "Scan loop started");

        while self.wake.wait(&self.scope).await {
            // The loop moves onto the blocking thread and comes back with it
            self = match tokio::task::spawn_blocking(move || {
                self.scan();
                self
            })
            .await
            {
                Ok(scan_loop) => scan_loop,
                Err(e) => {
                    warn!("Scan task ended abnormally: {}", e);
                    return;
                }
            };
        }

        info!(
            dir = %self.target.dir().display(),
            pending = self.monitor.pending_count(),
            "Scan loop stopped"
        );
    }

    /// Runs one scan and counts it once it's finished.
    pub(crate) fn scan(&mut self) -> ScanReport {
        let report = self.scan_directory();
        self.scans.fetch_add(1, Ordering::Relaxed);
        report
    }

    /// A listing failure is reported and leaves the snapshot untouched;
    /// the next wake simply tries again.
    fn scan_directory(&mut self) -> ScanReport {
        let listing = match list_directory(&self.target) {
            Ok(listing) => listing,
            Err(e) => {
                debug!(dir = %self.target.dir().display(), "Scan failed: {}", e);
                self.consumer.on_error(&e, None);
                return ScanReport::default();
            }
        };

        let new_files = diff(
            self.snapshot.as_ref(),
            &listing,
            self.target.ignores_existing(),
        );
        // Before partitioning, so a file that stays locked isn't "new" again
        self.snapshot = Some(listing.iter().collect());

        let mut report = ScanReport {
            listed: listing.len(),
            ..ScanReport::default()
        };
        if new_files.is_empty() {
            return report;
        }

        let mut ready = Vec::with_capacity(new_files.len());
        for path in new_files {
            match self.probe.is_locked(&path) {
                Ok(false) => ready.push(path),
                Ok(true) => report.locked.push(path),
                Err(e) => self.consumer.on_error(&e, Some(&path)),
            }
        }

        for path in &ready {
            if self.scope.is_cancelled() {
                debug!("Session cancelled mid-batch, leaving the rest");
                break;
            }
            if deliver(self.consumer.as_ref(), path) {
                report.delivered += 1;
            }
        }

        for path in &report.locked {
            self.monitor.watch(path.clone());
        }

        debug!(
            listed = report.listed,
            delivered = report.delivered,
            locked = report.locked.len(),
            "Scan complete"
        );
        report
    }
}
