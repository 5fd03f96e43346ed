//! Start/stop of the whole watching activity.
//!
//! A session is everything between one `start()` and the matching
//! `stop()`: a cancellation scope, a fresh snapshot, the scan loop, the
//! trigger and any retry workers. Nothing from a session outlives its
//! `stop()`.

use crate::gate::Gate;
use crate::monitor::{LockedFileMonitor, DEFAULT_RETRY_INTERVAL};
use crate::scan::WatchLoop;
use crate::trigger::{TriggerConfig, TriggerContext};
use crate::wake::WakeSignal;
use hopper_core::{
    FileConsumer, FsLockProbe, LockProbe, Result, WatchError, WatchTarget, WatcherState,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Handles to a running session's tasks.
struct Session {
    scan_task: JoinHandle<()>,
    trigger_task: JoinHandle<()>,
    workers: TaskTracker,
}

impl Session {
    /// Waits for every task of the session to finish.
    async fn join(self) {
        if let Err(e) = self.trigger_task.await {
            warn!("Trigger task ended abnormally: {}", e);
        }
        if let Err(e) = self.scan_task.await {
            warn!("Scan task ended abnormally: {}", e);
        }
        // The scan loop is gone, so nothing can spawn new workers
        self.workers.close();
        self.workers.wait().await;
    }
}

/// Signals belonging to the live session, reachable from `request_scan`.
#[derive(Clone)]
struct LiveSignals {
    wake: Arc<WakeSignal>,
    scope: CancellationToken,
    trigger_scope: CancellationToken,
}

/// Watches a directory and hands new, unlocked files to a consumer.
///
/// # Example
///
/// ```no_run
/// use hopper_core::{BoxError, WatchTarget};
/// use hopper_watcher::{DirectoryWatcher, TriggerConfig};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn run() -> hopper_core::Result<()> {
/// let consumer = |path: &Path| -> Result<(), BoxError> {
///     println!("ready: {}", path.display());
///     Ok(())
/// };
/// let watcher = DirectoryWatcher::new(WatchTarget::new("/data/inbox"), Arc::new(consumer))
///     .with_trigger(TriggerConfig::realtime());
///
/// watcher.start().await?;
/// // ...
/// watcher.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct DirectoryWatcher {
    target: WatchTarget,
    trigger: TriggerConfig,
    consumer: Arc<dyn FileConsumer>,
    probe: Arc<dyn LockProbe>,
    retry_interval: Duration,
    gate: Arc<Gate>,
    live: Mutex<Option<LiveSignals>>,
    // Held across the whole of start/stop, including joins
    session: tokio::sync::Mutex<Option<Session>>,
    scans: Arc<AtomicU64>,
}

impl DirectoryWatcher {
    /// Creates a stopped watcher with polling, the filesystem lock probe
    /// and a one second retry interval.
    pub fn new(target: WatchTarget, consumer: Arc<dyn FileConsumer>) -> Self {
        Self {
            target,
            trigger: TriggerConfig::default(),
            consumer,
            probe: Arc::new(FsLockProbe),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            gate: Arc::new(Gate::new()),
            live: Mutex::new(None),
            session: tokio::sync::Mutex::new(None),
            scans: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = trigger;
        self
    }

    /// Replaces the lock probe, e.g. with one that understands a
    /// producer's marker files.
    pub fn with_probe(mut self, probe: Arc<dyn LockProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// How long a locked file waits between probes.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn trigger(&self) -> TriggerConfig {
        self.trigger
    }

    pub fn state(&self) -> WatcherState {
        self.gate.state()
    }

    /// Total scans run since the watcher was created, across sessions.
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Starts watching.
    ///
    /// Spawns the scan loop and trigger onto the current tokio runtime and
    /// requests an initial scan, which takes the baseline snapshot.
    ///
    /// # Errors
    ///
    /// `WatchError::InvalidState` if the watcher is already started.
    pub async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        *session = Some(self.begin()?);

        info!(
            dir = %self.target.dir().display(),
            trigger = ?self.trigger,
            "Watcher started"
        );
        Ok(())
    }

    /// Stops watching and waits until every task of the session is gone.
    ///
    /// Files still waiting on a lock are abandoned without delivery. Stop
    /// takes at most about one retry interval.
    ///
    /// # Errors
    ///
    /// `WatchError::InvalidState` if the watcher is already stopped.
    pub async fn stop(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.end()?;

        if let Some(session) = session.take() {
            session.join().await;
        }

        info!(dir = %self.target.dir().display(), "Watcher stopped");
        Ok(())
    }

    /// Asks for a scan as soon as possible. Ignored while stopped.
    pub fn request_scan(&self) {
        if let Some(signals) = self.live_signals() {
            self.gate
                .run_if_live(&signals.scope, || signals.wake.request());
        }
    }

    fn live_signals(&self) -> Option<LiveSignals> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_live(&self, signals: Option<LiveSignals>) {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = signals;
    }

    /// The synchronous half of `start`, done under the lifecycle lock.
    fn begin(&self) -> Result<Session> {
        let mut state = self.gate.lock();
        if state.is_started() {
            return Err(WatchError::InvalidState(WatcherState::Started));
        }

        let scope = CancellationToken::new();
        let trigger_scope = scope.child_token();
        let wake = Arc::new(WakeSignal::new());
        let workers = TaskTracker::new();

        let monitor = LockedFileMonitor::new(
            Arc::clone(&self.probe),
            Arc::clone(&self.consumer),
            Arc::clone(&self.gate),
            scope.clone(),
            self.retry_interval,
            workers.clone(),
        );
        let scan_loop = WatchLoop::new(
            self.target.clone(),
            Arc::clone(&self.probe),
            Arc::clone(&self.consumer),
            monitor,
            Arc::clone(&wake),
            scope.clone(),
            Arc::clone(&self.scans),
        );
        let scan_task = tokio::spawn(scan_loop.run());

        let trigger_task = self.trigger.spawn(TriggerContext {
            target: self.target.clone(),
            gate: Arc::clone(&self.gate),
            wake: Arc::clone(&wake),
            scope: trigger_scope.clone(),
            consumer: Arc::clone(&self.consumer),
        });

        wake.request();
        self.set_live(Some(LiveSignals {
            wake,
            scope,
            trigger_scope,
        }));
        *state = WatcherState::Started;

        Ok(Session {
            scan_task,
            trigger_task,
            workers,
        })
    }

    /// Flips to stopped and cancels the session, under the lifecycle lock.
    ///
    /// Once this returns no callback of the session will act again.
    fn end(&self) -> Result<()> {
        let mut state = self.gate.lock();
        if !state.is_started() {
            return Err(WatchError::InvalidState(WatcherState::Stopped));
        }

        if let Some(signals) = self.live_signals() {
            // Trigger first so no new wakes arrive, then everything else
            signals.trigger_scope.cancel();
            signals.scope.cancel();
        }
        self.set_live(None);
        *state = WatcherState::Stopped;
        Ok(())
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        // Dropped without stop(): cancel so the tasks wind down on their own
        if self.gate.state().is_started() {
            let _ = self.end();
        }
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("target", &self.target)
            .field("trigger", &self.trigger)
            .field("retry_interval", &self.retry_interval)
            .field("state", &self.state())
            .finish()
    }
}
