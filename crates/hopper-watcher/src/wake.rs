//! Coalescing wake signal.
//!
//! Triggers ask for a scan; the scan loop waits for one. Any number of
//! requests made before the loop picks the signal up collapse into a
//! single pending scan, whether or not the loop is already parked.
//! Requests made while a scan is running re-arm the signal, so they are
//! never lost.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub(crate) struct WakeSignal {
    /// The flag itself. `notify` only tells the loop to look at it.
    pending: AtomicBool,
    notify: Notify,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Asks for a scan. Cheap and non-blocking.
    pub(crate) fn request(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Waits for a scan request, consuming it.
    ///
    /// Returns `false` if `scope` is cancelled first.
    pub(crate) async fn wait(&self, scope: &CancellationToken) -> bool {
        loop {
            if scope.is_cancelled() {
                return false;
            }
            if self.pending.swap(false, Ordering::AcqRel) {
                return true;
            }

            // A stored permit can outlive the flag it announced; that just
            // costs one extra trip round the loop
            tokio::select! {
                biased;
                _ = scope.cancelled() => return false,
                _ = self.notify.notified() => {}
            }
        }
    }
}
