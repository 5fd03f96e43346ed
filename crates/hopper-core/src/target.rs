//! What to watch.
//!
//! A `WatchTarget` is fixed when the watcher is built: the directory, an
//! optional glob on file names, and whether files already sitting in the
//! directory at Start count as new arrivals.

use crate::error::{Result, WatchError};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

/// Glob-style filter applied to file names (not full paths).
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: Pattern,
}

impl NameFilter {
    /// Compiles a glob such as `*.csv` or `export_??.txt`.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern).map_err(|source| WatchError::Filter {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { pattern })
    }

    /// The original glob text.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Checks the file name component of `path` against the glob.
    ///
    /// Paths without a file name (like `/` or `..`) never match.
    pub fn matches(&self, path: &Path) -> bool {
        let options = MatchOptions {
            case_sensitive: !cfg!(windows),
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| self.pattern.matches_with(name, options))
            .unwrap_or(false)
    }
}

/// The directory being watched and how to treat it.
#[derive(Debug, Clone)]
pub struct WatchTarget {
    dir: PathBuf,
    filter: Option<NameFilter>,
    ignore_existing_on_start: bool,
}

impl WatchTarget {
    /// Watches every file in `dir`, treating existing files as new.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            filter: None,
            ignore_existing_on_start: false,
        }
    }

    /// Restricts the target to file names matching `pattern`.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self> {
        self.filter = Some(NameFilter::new(pattern)?);
        Ok(self)
    }

    /// When true, files present at Start are never reported.
    pub fn ignore_existing_on_start(mut self, ignore: bool) -> Self {
        self.ignore_existing_on_start = ignore;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn filter(&self) -> Option<&NameFilter> {
        self.filter.as_ref()
    }

    pub fn ignores_existing(&self) -> bool {
        self.ignore_existing_on_start
    }

    /// True if `path` passes the name filter (or there is none).
    pub fn accepts(&self, path: &Path) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(path))
    }
}
