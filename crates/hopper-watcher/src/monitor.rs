//! Locked-file retry workers.
//!
//! A new file that's still being written gets its own task. The task
//! sleeps, probes, and repeats until the file is free (deliver it), the
//! probe fails (report it), or the session is cancelled (walk away).
//! Workers never block the scan loop or each other. Each attempt runs on
//! tokio's blocking pool, since probing and delivery are both blocking.

use crate::deliver::deliver;
use crate::gate::Gate;
use hopper_core::{FileConsumer, LockProbe};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace, warn};

/// Default delay between probes of a locked file.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// What one probe of a locked file ended with.
enum Attempt {
    StillLocked,
    Finished,
}

/// Spawns and tracks one retry worker per locked file.
pub(crate) struct LockedFileMonitor {
    worker: Arc<RetryWorker>,
    tracker: TaskTracker,
}

struct RetryWorker {
    probe: Arc<dyn LockProbe>,
    consumer: Arc<dyn FileConsumer>,
    gate: Arc<Gate>,
    scope: CancellationToken,
    retry_interval: Duration,
    pending: Mutex<HashSet<PathBuf>>,
}

impl LockedFileMonitor {
    pub(crate) fn new(
        probe: Arc<dyn LockProbe>,
        consumer: Arc<dyn FileConsumer>,
        gate: Arc<Gate>,
        scope: CancellationToken,
        retry_interval: Duration,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            worker: Arc::new(RetryWorker {
                probe,
                consumer,
                gate,
                scope,
                retry_interval,
                pending: Mutex::new(HashSet::new()),
            }),
            tracker,
        }
    }

    /// Starts retrying `path` in the background.
    ///
    /// A path that already has a worker in this session is left alone.
    pub(crate) fn watch(&self, path: PathBuf) {
        if !self.worker.pending().insert(path.clone()) {
            trace!(path = %path.display(), "Already waiting on lock");
            return;
        }

        debug!(path = %path.display(), "File is locked, retrying in background");
        let worker = Arc::clone(&self.worker);
        self.tracker.spawn(worker.run(path));
    }

    /// Number of files currently waiting to unlock.
    pub(crate) fn pending_count(&self) -> usize {
        self.worker.pending().len()
    }
}

impl RetryWorker {
    fn pending(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(self: Arc<Self>, path: PathBuf) {
        let mut locked_probes = 0u32;
        loop {
            tokio::select! {
                biased;
                _ = self.scope.cancelled() => break,
                _ = tokio::time::sleep(self.retry_interval) => {}
            }

            // Stop may have begun while we slept
            let worker = Arc::clone(&self);
            let probe_path = path.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                worker
                    .gate
                    .run_if_live(&worker.scope, || worker.attempt(&probe_path))
            })
            .await;

            match outcome {
                Ok(Some(Attempt::StillLocked)) => {
                    locked_probes += 1;
                    trace!(path = %path.display(), locked_probes, "Still locked");
                }
                Ok(Some(Attempt::Finished)) | Ok(None) => break,
                Err(e) => {
                    warn!(path = %path.display(), "Retry attempt ended abnormally: {}", e);
                    break;
                }
            }
        }

        self.pending().remove(&path);
    }

    fn attempt(&self, path: &Path) -> Attempt {
        match self.probe.is_locked(path) {
            Ok(true) => Attempt::StillLocked,
            Ok(false) => {
                deliver(self.consumer.as_ref(), path);
                Attempt::Finished
            }
            Err(e) => {
                self.consumer.on_error(&e, Some(path));
                Attempt::Finished
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wait_until, RecordingConsumer, ScriptedProbe};
    use hopper_core::WatcherState;
    use std::fs;
    use tempfile::tempdir;

    const RETRY: Duration = Duration::from_millis(20);

    struct Fixture {
        probe: Arc<ScriptedProbe>,
        consumer: Arc<RecordingConsumer>,
        gate: Arc<Gate>,
        scope: CancellationToken,
        tracker: TaskTracker,
        monitor: LockedFileMonitor,
    }

    fn fixture() -> Fixture {
        let probe = Arc::new(ScriptedProbe::new());
        let consumer = Arc::new(RecordingConsumer::new());
        let gate = Arc::new(Gate::new());
        *gate.lock() = WatcherState::Started;
        let scope = CancellationToken::new();
        let tracker = TaskTracker::new();
        let monitor = LockedFileMonitor::new(
            probe.clone(),
            consumer.clone(),
            gate.clone(),
            scope.clone(),
            RETRY,
            tracker.clone(),
        );
        Fixture {
            probe,
            consumer,
            gate,
            scope,
            tracker,
            monitor,
        }
    }

    #[tokio::test]
    async fn test_delivers_once_unlocked() {
        let fx = fixture();
        let dir = tempdir().unwrap();
        let path = dir.path().join("b.txt");
        fs::write(&path, "data").unwrap();
        fx.probe.lock_for(&path, 2);

        fx.monitor.watch(path.clone());
        assert!(wait_until(Duration::from_secs(2), || !fx.consumer.delivered().is_empty()).await);

        fx.tracker.close();
        fx.tracker.wait().await;
        assert_eq!(fx.consumer.delivered(), vec![path.clone()]);
        assert_eq!(fx.probe.calls(&path), 3);
        assert_eq!(fx.monitor.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_vanished_file_is_reported_not_delivered() {
        let fx = fixture();
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        fx.monitor.watch(path.clone());
        fx.tracker.close();
        fx.tracker.wait().await;

        assert!(fx.consumer.delivered().is_empty());
        let errors = fx.consumer.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_cancellation_abandons_silently() {
        let fx = fixture();
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.txt");
        fs::write(&path, "data").unwrap();
        fx.probe.hold(&path);

        fx.monitor.watch(path.clone());
        assert!(wait_until(Duration::from_secs(2), || fx.probe.calls(&path) >= 2).await);

        fx.scope.cancel();
        fx.tracker.close();
        fx.tracker.wait().await;

        fx.probe.release(&path);
        tokio::time::sleep(RETRY * 3).await;
        assert!(fx.consumer.delivered().is_empty());
        assert!(fx.consumer.errors().is_empty());
    }

    #[tokio::test]
    async fn test_stopped_gate_stops_worker() {
        let fx = fixture();
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.txt");
        fs::write(&path, "data").unwrap();

        // Stop has begun but the scope isn't cancelled yet
        *fx.gate.lock() = WatcherState::Stopped;
        fx.monitor.watch(path.clone());
        fx.tracker.close();
        fx.tracker.wait().await;

        assert_eq!(fx.probe.calls(&path), 0);
        assert!(fx.consumer.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_watch_is_ignored() {
        let fx = fixture();
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.txt");
        fs::write(&path, "data").unwrap();
        fx.probe.lock_for(&path, 1);

        fx.monitor.watch(path.clone());
        fx.monitor.watch(path.clone());
        assert_eq!(fx.monitor.pending_count(), 1);

        fx.tracker.close();
        fx.tracker.wait().await;
        assert_eq!(fx.consumer.delivered(), vec![path]);
    }
}
