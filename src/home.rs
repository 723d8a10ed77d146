//! Per-workspace daemon home and cleanup of what an unclean shutdown leaves in it.

use std::io;
use std::path::{Path, PathBuf};

/// Left behind by a daemon that did not shut down cleanly; a fresh daemon
/// refuses to start or misbehaves while they exist.
pub const STALE_ARTIFACTS: &[&str] = &[
    "index-v0.14.0.db/LOCK",
    "index/LOCK",
    "csrftokens.txt",
    "syncthing.log.lck",
];

/// The `--home` directory of an owned daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeDirectory {
    path: PathBuf,
}

impl HomeDirectory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.path)
    }

    /// Remove every stale artifact present. Returns how many were removed;
    /// failures are logged and skipped.
    pub fn clean_stale_locks(&self) -> usize {
        let mut removed = 0;
        for artifact in STALE_ARTIFACTS {
            let path = self.path.join(artifact);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("removed stale {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove {}: {e}", path.display()),
            }
        }
        if removed > 0 {
            info!("cleaned {removed} stale lock file(s) in {}", self.path.display());
        }
        removed
    }
}
