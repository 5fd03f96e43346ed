//! Trigger strategies.
//!
//! A trigger decides *when* the directory gets looked at; the scan loop
//! decides *how*. Both strategies only ever request a wake, and only
//! while the session they belong to is live.
//!
//! OS notifications can be dropped silently under load, so the realtime
//! strategy tears its subscription down and rebuilds it on a timer,
//! forcing one extra scan each time. That bounds how stale a missed
//! event can get.

use crate::gate::Gate;
use crate::wake::WakeSignal;
use hopper_core::{FileConsumer, TriggerMode, WatchConfig, WatchError, WatchTarget};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Default polling interval, and default resubscribe interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Which wake source drives the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerConfig {
    /// Re-list the directory every `interval`.
    Polling { interval: Duration },
    /// Scan on OS notifications; rebuild the subscription (and scan once)
    /// every `resubscribe_interval`.
    RealTime { resubscribe_interval: Duration },
}

impl TriggerConfig {
    pub fn polling() -> Self {
        TriggerConfig::Polling {
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn realtime() -> Self {
        TriggerConfig::RealTime {
            resubscribe_interval: DEFAULT_INTERVAL,
        }
    }

    /// Picks the strategy and interval from a config file.
    pub fn from_config(config: &WatchConfig) -> Self {
        match config.mode {
            TriggerMode::Polling => TriggerConfig::Polling {
                interval: config.interval(),
            },
            TriggerMode::Realtime => TriggerConfig::RealTime {
                resubscribe_interval: config.interval(),
            },
        }
    }

    /// Starts the trigger for one session.
    pub(crate) fn spawn(&self, ctx: TriggerContext) -> JoinHandle<()> {
        let ctx = Arc::new(ctx);
        match *self {
            TriggerConfig::Polling { interval } => tokio::spawn(poll(ctx, interval)),
            TriggerConfig::RealTime {
                resubscribe_interval,
            } => tokio::spawn(realtime(ctx, resubscribe_interval)),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::polling()
    }
}

/// Everything a trigger needs from its session.
pub(crate) struct TriggerContext {
    pub(crate) target: WatchTarget,
    pub(crate) gate: Arc<Gate>,
    pub(crate) wake: Arc<WakeSignal>,
    pub(crate) scope: CancellationToken,
    pub(crate) consumer: Arc<dyn FileConsumer>,
}

impl TriggerContext {
    /// Requests a scan if the session is live. False once Stop has begun.
    fn request_wake(&self) -> bool {
        self.gate
            .run_if_live(&self.scope, || self.wake.request())
            .is_some()
    }

    fn report(&self, error: WatchError) {
        self.gate.run_if_live(&self.scope, || {
            self.consumer.on_error(&error, Some(self.target.dir()))
        });
    }

    /// Called on notify's thread.
    fn on_event(&self, result: notify::Result<Event>) {
        match result {
            Ok(event) => {
                if is_arrival(&event, &self.target) {
                    trace!(kind = ?event.kind, "Notification, requesting scan");
                    self.request_wake();
                }
            }
            Err(e) => self.report(WatchError::Trigger(Box::new(e))),
        }
    }
}

/// True for events that can mean a new file showed up.
///
/// Deletes count too: a delete-then-recreate may be reported as just the
/// delete when events are coalesced.
fn is_arrival(event: &Event, target: &WatchTarget) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Any
            | EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    );
    relevant && (event.paths.is_empty() || event.paths.iter().any(|p| target.accepts(p)))
}

async fn poll(ctx: Arc<TriggerContext>, interval: Duration) {
    // Start already requested the first scan
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(?interval, "Polling trigger started");
    loop {
        tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => break,
            _ = ticker.tick() => {
                trace!("Poll tick, requesting scan");
                if !ctx.request_wake() {
                    break;
                }
            }
        }
    }
    debug!("Polling trigger stopped");
}

async fn realtime(ctx: Arc<TriggerContext>, resubscribe_interval: Duration) {
    debug!(?resubscribe_interval, "Realtime trigger started");
    loop {
        let subscription = subscribe(&ctx);

        tokio::select! {
            biased;
            _ = ctx.scope.cancelled() => break,
            _ = tokio::time::sleep(resubscribe_interval) => {}
        }

        // Drop the old subscription before building the next one
        drop(subscription);
        trace!("Resubscribing, requesting scan");
        if !ctx.request_wake() {
            break;
        }
    }
    debug!("Realtime trigger stopped");
}

/// Subscribes to notifications for the target directory.
///
/// A failure is reported and yields no subscription; the resubscribe
/// timer keeps scans going and retries the subscription later.
fn subscribe(ctx: &Arc<TriggerContext>) -> Option<RecommendedWatcher> {
    let handler = Arc::clone(ctx);
    let result = notify::recommended_watcher(move |res: notify::Result<Event>| {
        handler.on_event(res)
    })
    .and_then(|mut watcher| {
        watcher.watch(ctx.target.dir(), RecursiveMode::NonRecursive)?;
        Ok(watcher)
    });

    match result {
        Ok(watcher) => {
            info!(dir = %ctx.target.dir().display(), "Subscribed to notifications");
            Some(watcher)
        }
        Err(e) => {
            ctx.report(WatchError::Trigger(Box::new(e)));
            None
        }
    }
}
