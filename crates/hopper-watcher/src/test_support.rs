//! Shared fixtures for watcher tests.

use hopper_core::{BoxError, FileConsumer, LockProbe, WatchError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Consumer that remembers everything it was told.
#[derive(Default)]
pub(crate) struct RecordingConsumer {
    delivered: Mutex<Vec<PathBuf>>,
    errors: Mutex<Vec<(String, Option<PathBuf>)>>,
    fail_on: Option<String>,
    panic_on: Option<String>,
}

impl RecordingConsumer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rejects files with this name.
    pub(crate) fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Panics on files with this name.
    pub(crate) fn panicking_on(name: &str) -> Self {
        Self {
            panic_on: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn delivered(&self) -> Vec<PathBuf> {
        self.delivered.lock().unwrap().clone()
    }

    pub(crate) fn errors(&self) -> Vec<(String, Option<PathBuf>)> {
        self.errors.lock().unwrap().clone()
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

impl FileConsumer for RecordingConsumer {
    fn on_available(&self, path: &Path) -> Result<(), BoxError> {
        if self.panic_on.as_deref().is_some_and(|n| file_name(path) == Some(n)) {
            panic!("cannot handle {}", path.display());
        }
        if self.fail_on.as_deref().is_some_and(|n| file_name(path) == Some(n)) {
            return Err("rejected by test consumer".into());
        }
        self.delivered.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn on_error(&self, error: &WatchError, path: Option<&Path>) {
        self.errors
            .lock()
            .unwrap()
            .push((error.to_string(), path.map(Path::to_path_buf)));
    }
}

#[derive(Debug, Clone, Copy)]
enum Script {
    /// Locked for this many more probes.
    Probes(usize),
    /// Locked until released.
    Held,
}

/// Probe whose answers are scripted per path.
///
/// Unscripted files are unlocked; files that don't exist on disk are
/// reported as not found, like the real probe.
#[derive(Default)]
pub(crate) struct ScriptedProbe {
    scripts: Mutex<HashMap<PathBuf, Script>>,
    calls: Mutex<HashMap<PathBuf, usize>>,
}

impl ScriptedProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// `path` reports locked for its first `probes` probes.
    pub(crate) fn lock_for(&self, path: &Path, probes: usize) {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Script::Probes(probes));
    }

    /// `path` reports locked until [`release`](Self::release).
    pub(crate) fn hold(&self, path: &Path) {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Script::Held);
    }

    pub(crate) fn release(&self, path: &Path) {
        self.scripts.lock().unwrap().remove(path);
    }

    /// How many times `path` has been probed.
    pub(crate) fn calls(&self, path: &Path) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl LockProbe for ScriptedProbe {
    fn is_locked(&self, path: &Path) -> hopper_core::Result<bool> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default() += 1;

        if !path.exists() {
            return Err(WatchError::NotFound(path.to_path_buf()));
        }

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(path) {
            Some(Script::Held) => Ok(true),
            Some(Script::Probes(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub(crate) async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
