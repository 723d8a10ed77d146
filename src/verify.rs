//! Confirms a candidate path really is the syncthing executable.

use crate::discovery::PRODUCT_NAME;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time;

pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(3);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub struct ExecutableVerifier {
    timeout: Duration,
    /// Paths that already answered `--version`; not run again
    trusted: Mutex<HashSet<PathBuf>>,
}

impl Default for ExecutableVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableVerifier {
    pub fn new() -> Self {
        Self::with_timeout(VERIFY_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            trusted: Mutex::new(HashSet::new()),
        }
    }

    fn lock_trusted(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.trusted.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_trusted(&self, path: &Path) -> bool {
        self.lock_trusted().contains(path)
    }

    /// Returns true only if `path` exists, runs, exits 0 and mentions syncthing.
    /// Never errors; every failure is `false`.
    pub async fn verify(&self, path: &Path) -> bool {
        if !path.is_file() {
            debug!("verify: {} does not exist", path.display());
            return false;
        }
        if self.is_trusted(path) {
            trace!("verify: {} already confirmed", path.display());
            return true;
        }
        let valid = self.run_version(path).await;
        debug!("verify: {} -> {valid}", path.display());
        if valid {
            self.lock_trusted().insert(path.to_path_buf());
        }
        valid
    }

    async fn run_version(&self, path: &Path) -> bool {
        let mut cmd = tokio::process::Command::new(path);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!("verify: could not run {}: {e}", path.display());
                return false;
            }
        };
        // dropping the child on timeout kills it
        match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).to_lowercase();
                combined.push_str(&String::from_utf8_lossy(&output.stderr).to_lowercase());
                trace!(
                    "verify: {} exited with {}, output: {}",
                    path.display(),
                    output.status,
                    combined.trim()
                );
                output.status.success() && combined.contains(PRODUCT_NAME)
            }
            Ok(Err(e)) => {
                debug!("verify: waiting on {} failed: {e}", path.display());
                false
            }
            Err(_) => {
                debug!(
                    "verify: {} did not answer within {:?}, killed",
                    path.display(),
                    self.timeout
                );
                false
            }
        }
    }
}
