//! Change detection.
//!
//! Compares what the directory looked like on the previous scan against
//! a fresh listing and reports what's new. Deletions and modifications
//! aren't interesting here; only arrivals are.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Every file path seen on the most recent scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    paths: HashSet<PathBuf>,
}

impl Snapshot {
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

impl FromIterator<PathBuf> for Snapshot {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a PathBuf> for Snapshot {
    fn from_iter<I: IntoIterator<Item = &'a PathBuf>>(iter: I) -> Self {
        iter.into_iter().cloned().collect()
    }
}

/// Returns the entries of `current` that weren't in `previous`.
///
/// `previous` is `None` before the first scan. In that case everything is
/// new, unless `ignore_existing` says the cold-start contents don't count.
/// The result keeps the order of `current`.
///
/// This doesn't touch any state. The caller stores `current` as the next
/// snapshot whatever the outcome, so a file that stays locked over several
/// scans isn't rediscovered each time.
pub fn diff(previous: Option<&Snapshot>, current: &[PathBuf], ignore_existing: bool) -> Vec<PathBuf> {
    match previous {
        None if ignore_existing => Vec::new(),
        None => current.to_vec(),
        Some(previous) => current
            .iter()
            .filter(|path| !previous.contains(path))
            .cloned()
            .collect(),
    }
}
