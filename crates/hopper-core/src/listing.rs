//! Directory listing.
//!
//! Lists the regular files directly inside the watched directory,
//! applying the target's name filter. Subdirectories are not descended
//! into: producers drop files at the top level.

use crate::error::{Result, WatchError};
use crate::target::WatchTarget;
use std::path::PathBuf;
use tracing::trace;
use walkdir::WalkDir;

/// Lists the files currently in the target directory, sorted by name.
///
/// Fails if the directory itself can't be read. Individual entries that
/// vanish mid-listing are skipped; the next scan will sort them out.
///
/// # Example
///
/// ```no_run
/// use hopper_core::{list_directory, WatchTarget};
///
/// let target = WatchTarget::new("/data/inbox").with_filter("*.csv").unwrap();
/// for path in list_directory(&target).unwrap() {
///     println!("{}", path.display());
/// }
/// ```
pub fn list_directory(target: &WatchTarget) -> Result<Vec<PathBuf>> {
    let root = target.dir();

    // Surface a missing or unreadable directory instead of an empty listing
    std::fs::read_dir(root).map_err(|e| WatchError::listing(root, e))?;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if e.depth() == 0 {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory loop"));
                    return Err(WatchError::listing(root, source));
                }
                trace!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        // Skip directories and anything else that isn't a plain file
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        if target.accepts(&path) {
            files.push(path);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_list_empty_directory() {
        let dir = tempdir().unwrap();
        let files = list_directory(&WatchTarget::new(dir.path())).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_lists_files_sorted_and_skips_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "c").unwrap();

        let files = list_directory(&WatchTarget::new(dir.path())).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.txt"), dir.path().join("b.txt")]
        );
    }

    #[test]
    fn test_applies_name_filter() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("orders.csv"), "").unwrap();
        fs::write(dir.path().join("orders.csv.part"), "").unwrap();

        let target = WatchTarget::new(dir.path()).with_filter("*.csv").unwrap();
        let files = list_directory(&target).unwrap();
        assert_eq!(files, vec![dir.path().join("orders.csv")]);
    }

    #[test]
    fn test_missing_directory_is_a_listing_error() {
        let dir = tempdir().unwrap();
        let target = WatchTarget::new(dir.path().join("nope"));

        let err = list_directory(&target).unwrap_err();
        assert!(matches!(err, WatchError::Listing { .. }));
    }
}
