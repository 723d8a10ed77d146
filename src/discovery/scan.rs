use super::PRODUCT_NAME;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time;
use walkdir::{DirEntry, WalkDir};

/// Search `root` for `exe_name`, at most `depth` levels deep, on a blocking thread.
pub(crate) async fn scan_root(
    root: PathBuf,
    exe_name: String,
    depth: usize,
    timeout: Duration,
) -> Option<PathBuf> {
    if !root.is_dir() {
        trace!("scan: {} is not a directory", root.display());
        return None;
    }
    debug!("scan: searching {}", root.display());
    let task = tokio::task::spawn_blocking(move || find_in(&root, &exe_name, depth));
    match time::timeout(timeout, task).await {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            warn!("scan: task failed: {e}");
            None
        }
        Err(_) => {
            debug!("scan: gave up after {timeout:?}");
            None
        }
    }
}

/// Only directories named after the product are entered; unreadable entries are skipped.
pub(crate) fn find_in(root: &Path, exe_name: &str, depth: usize) -> Option<PathBuf> {
    WalkDir::new(root)
        .max_depth(depth)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || is_relevant_dir(entry)
        })
        .filter_map(|entry| entry.ok())
        .find(|entry| {
            entry.depth() > 0
                && !entry.file_type().is_dir()
                && name_matches(entry.file_name(), exe_name)
        })
        .map(DirEntry::into_path)
}

fn is_relevant_dir(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy().to_lowercase();
    !name.starts_with('.') && name.contains(PRODUCT_NAME)
}

fn name_matches(name: &OsStr, exe_name: &str) -> bool {
    name.to_string_lossy().eq_ignore_ascii_case(exe_name)
}
