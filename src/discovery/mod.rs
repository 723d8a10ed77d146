//! Executable discovery
//!
//! Strategies run strictly in order, each only after the previous one came up
//! empty:
//! - manual path from settings (trusted if it exists)
//! - cached auto-detected path (trusted if it still exists)
//! - `locations`: common per-OS install locations
//! - `lookup`: PATH lookup through `which`/`where`/PowerShell
//! - `windows`: shortcut targets and registry uninstall keys
//! - `scan`: bounded recursive directory scan
//!
//! A failing strategy never aborts the search.

mod locations;
mod lookup;
mod scan;
mod windows;

pub use locations::Locations;

use crate::settings::Settings;
use crate::verify::ExecutableVerifier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const PRODUCT_NAME: &str = "syncthing";

#[cfg(windows)]
pub const EXE_NAME: &str = "syncthing.exe";
#[cfg(not(windows))]
pub const EXE_NAME: &str = "syncthing";

/// Upper bound for a single lookup command (`which`, `reg query`, ...)
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Which strategy produced a path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Manual,
    Cached,
    CommonPath,
    Path,
    Shortcut,
    Registry,
    Scan,
}

impl Strategy {
    /// Found by searching rather than taken from settings.
    pub fn is_auto_detected(&self) -> bool {
        !matches!(self, Strategy::Manual | Strategy::Cached)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryResult {
    Found { path: PathBuf, strategy: Strategy },
    NotFound,
}

impl DiscoveryResult {
    pub fn path(&self) -> Option<&Path> {
        match self {
            DiscoveryResult::Found { path, .. } => Some(path),
            DiscoveryResult::NotFound => None,
        }
    }

    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            DiscoveryResult::Found { strategy, .. } => Some(*strategy),
            DiscoveryResult::NotFound => None,
        }
    }

    fn found(path: PathBuf, strategy: Strategy) -> Self {
        info!("found syncthing at {} ({strategy})", path.display());
        DiscoveryResult::Found { path, strategy }
    }
}

pub struct PathResolver {
    locations: Locations,
    verifier: Arc<ExecutableVerifier>,
}

impl PathResolver {
    pub fn new(verifier: Arc<ExecutableVerifier>) -> Self {
        Self::with_locations(Locations::for_current_os(), verifier)
    }

    pub fn with_locations(locations: Locations, verifier: Arc<ExecutableVerifier>) -> Self {
        Self {
            locations,
            verifier,
        }
    }

    /// Find an executable, honoring the manual and cached paths in `settings` first.
    pub async fn resolve(&self, settings: &Settings) -> DiscoveryResult {
        if let Some(path) = settings.manual_path() {
            if path.exists() {
                return DiscoveryResult::found(path, Strategy::Manual);
            }
            warn!(
                "manual path {} does not exist, falling back to auto-detection",
                path.display()
            );
        }
        if let Some(path) = settings.cached_path() {
            if path.exists() {
                return DiscoveryResult::found(path, Strategy::Cached);
            }
            debug!("cached path {} no longer exists", path.display());
        }
        self.detect().await
    }

    /// Search without consulting settings.
    pub async fn detect(&self) -> DiscoveryResult {
        debug!("detecting syncthing executable");
        if let Some(path) = self.from_common_paths().await {
            return DiscoveryResult::found(path, Strategy::CommonPath);
        }
        if let Some(path) = self.from_path_lookup().await {
            return DiscoveryResult::found(path, Strategy::Path);
        }
        if self.locations.windows {
            if let Some(path) = self.from_shortcuts().await {
                return DiscoveryResult::found(path, Strategy::Shortcut);
            }
            if let Some(path) = self.from_registry().await {
                return DiscoveryResult::found(path, Strategy::Registry);
            }
        }
        if let Some(path) = self.from_scan().await {
            return DiscoveryResult::found(path, Strategy::Scan);
        }
        info!("syncthing not found in any known location");
        DiscoveryResult::NotFound
    }

    async fn first_verified(&self, candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            trace!("checking {}", candidate.display());
            if candidate.exists() && self.verifier.verify(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }

    async fn from_common_paths(&self) -> Option<PathBuf> {
        self.first_verified(self.locations.common.iter().cloned())
            .await
    }

    async fn from_path_lookup(&self) -> Option<PathBuf> {
        for argv in &self.locations.lookup_commands {
            if let Some(path) = lookup::first_path(argv, self.locations.lookup_timeout).await
                && self.verifier.verify(&path).await
            {
                return Some(path);
            }
        }
        None
    }

    async fn from_shortcuts(&self) -> Option<PathBuf> {
        for shortcut in self.locations.shortcuts.iter().filter(|s| s.exists()) {
            if let Some(target) =
                windows::resolve_shortcut(shortcut, self.locations.lookup_timeout).await
                && self.verifier.verify(&target).await
            {
                return Some(target);
            }
        }
        None
    }

    async fn from_registry(&self) -> Option<PathBuf> {
        let candidates =
            windows::registry_candidates(&self.locations.exe_name, self.locations.lookup_timeout)
                .await;
        self.first_verified(candidates).await
    }

    async fn from_scan(&self) -> Option<PathBuf> {
        for root in &self.locations.scan_roots {
            if let Some(found) = scan::scan_root(
                root.clone(),
                self.locations.exe_name.clone(),
                self.locations.scan_depth,
                self.locations.scan_timeout,
            )
            .await
                && self.verifier.verify(&found).await
            {
                return Some(found);
            }
        }
        None
    }
}
