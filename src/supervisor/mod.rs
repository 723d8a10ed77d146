//! Supervisor module - owns the single syncthing daemon handle
//!
//! This module is split into focused submodules:
//! - `lifecycle`: start/stop/restart, spawning and the exit monitor
//! - `watchers`: the periodic sync timer and REST-backed operations
//!
//! All lifecycle transitions are serialized by `lifecycle_lock`. The handle,
//! the in-flight transition and the last exit live together in `Slot` so a
//! status snapshot is always consistent.

mod lifecycle;
mod watchers;

use crate::daemon::{DaemonHandle, Status};
use crate::daemon_status::{ExitReport, SupervisorState};
use crate::detect::RunningInstanceDetector;
use crate::discovery::PathResolver;
use crate::home::HomeDirectory;
use crate::procs::{PROCS, ProcessControl};
use crate::settings::Settings;
use crate::verify::ExecutableVerifier;
use crate::env;
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Collaborators of a supervisor. `Default` wires up the real system.
pub struct SupervisorOpts {
    pub verifier: Arc<ExecutableVerifier>,
    pub resolver: PathResolver,
    pub detector: RunningInstanceDetector,
    pub procs: Arc<dyn ProcessControl>,
    /// The home directory defaults to `<workspace>/.syncwarden`
    pub workspace: PathBuf,
    /// Where daemon stdout/stderr is appended
    pub daemon_log: PathBuf,
}

impl Default for SupervisorOpts {
    fn default() -> Self {
        let verifier = Arc::new(ExecutableVerifier::new());
        Self {
            resolver: PathResolver::new(verifier.clone()),
            verifier,
            detector: RunningInstanceDetector::default(),
            procs: PROCS.clone(),
            workspace: env::SYNCWARDEN_WORKSPACE.clone(),
            daemon_log: env::DAEMON_LOG_FILE.clone(),
        }
    }
}

#[derive(Default)]
pub(crate) struct Slot {
    pub(crate) handle: DaemonHandle,
    /// `Starting` or `Stopping` while a transition is in flight
    pub(crate) transition: Option<SupervisorState>,
    pub(crate) stop_requested: bool,
    pub(crate) last_exit: Option<ExitReport>,
    pub(crate) executable: Option<PathBuf>,
    /// Flips to true once the owned child has been reaped
    pub(crate) exited: Option<watch::Receiver<bool>>,
}

impl Slot {
    pub(crate) fn state(&self) -> SupervisorState {
        match (self.transition, &self.handle) {
            (Some(transition), _) => transition,
            (None, DaemonHandle::None) => SupervisorState::Stopped,
            (None, DaemonHandle::Owned { .. }) => SupervisorState::Owned,
            (None, DaemonHandle::Adopted { .. }) => SupervisorState::Adopted,
        }
    }
}

pub struct Supervisor {
    settings: Mutex<Settings>,
    slot: Mutex<Slot>,
    lifecycle_lock: tokio::sync::Mutex<()>,
    pending_notifications: Mutex<Vec<(LevelFilter, String)>>,
    sync_timer: Mutex<Option<JoinHandle<()>>>,
    verifier: Arc<ExecutableVerifier>,
    resolver: PathResolver,
    detector: RunningInstanceDetector,
    procs: Arc<dyn ProcessControl>,
    workspace: PathBuf,
    daemon_log: PathBuf,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Supervisor {
    pub fn new(settings: Settings) -> Arc<Self> {
        Self::with_opts(settings, SupervisorOpts::default())
    }

    pub fn with_opts(settings: Settings, opts: SupervisorOpts) -> Arc<Self> {
        Arc::new(Self {
            settings: Mutex::new(settings),
            slot: Mutex::new(Slot::default()),
            lifecycle_lock: tokio::sync::Mutex::new(()),
            pending_notifications: Mutex::new(vec![]),
            sync_timer: Mutex::new(None),
            verifier: opts.verifier,
            resolver: opts.resolver,
            detector: opts.detector,
            procs: opts.procs,
            workspace: opts.workspace,
            daemon_log: opts.daemon_log,
        })
    }

    pub fn settings(&self) -> Settings {
        lock(&self.settings).clone()
    }

    pub(crate) fn store_settings(&self, settings: Settings) {
        *lock(&self.settings) = settings;
    }

    pub(crate) fn slot(&self) -> MutexGuard<'_, Slot> {
        lock(&self.slot)
    }

    pub fn verifier(&self) -> &ExecutableVerifier {
        &self.verifier
    }

    pub fn handle(&self) -> DaemonHandle {
        self.slot().handle.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.slot().state()
    }

    pub fn is_running(&self) -> bool {
        self.slot().handle.is_live()
    }

    pub fn home(&self) -> HomeDirectory {
        HomeDirectory::new(self.settings().home_dir_for(&self.workspace))
    }

    pub fn status(&self) -> Status {
        let slot = self.slot();
        let home = match &slot.handle {
            DaemonHandle::Owned { home, .. } => Some(home.clone()),
            _ => None,
        };
        Status {
            state: slot.state(),
            running: slot.handle.is_live(),
            port: slot.handle.port(),
            ownership: slot.handle.ownership(),
            pid: slot.handle.pid(),
            home,
            executable: slot.executable.clone(),
            last_exit: slot.last_exit.clone(),
        }
    }

    /// Web UI address of the live daemon.
    pub fn gui_url(&self) -> Option<String> {
        self.slot()
            .handle
            .port()
            .map(|port| format!("http://127.0.0.1:{port}"))
    }

    /// Queue a notice for the host. Informational notices are dropped when
    /// `show_notifications` is off; warnings and errors always go through.
    pub(crate) fn notify(&self, level: LevelFilter, message: impl Into<String>) {
        let message = message.into();
        trace!("notification ({level}): {message}");
        if level > LevelFilter::Warn && !lock(&self.settings).show_notifications {
            return;
        }
        lock(&self.pending_notifications).push((level, message));
    }

    /// Drain queued notices, oldest first.
    pub fn take_notifications(&self) -> Vec<(LevelFilter, String)> {
        std::mem::take(&mut *lock(&self.pending_notifications))
    }

    /// Resolves once no owned child is running. Returns immediately for an
    /// adopted or absent daemon.
    pub async fn wait_for_exit(&self) {
        let exited = self.slot().exited.clone();
        if let Some(mut exited) = exited {
            let _ = exited.wait_for(|done| *done).await;
        }
    }

    /// Host teardown: stop an owned child, leave an adopted one alone, cancel the timer.
    pub async fn shutdown(self: &Arc<Self>) {
        debug!("shutting down supervisor");
        self.cancel_sync_timer();
        let handle = self.handle();
        match handle {
            DaemonHandle::Owned { .. } => {
                if let Err(e) = self.stop().await
                    && !e.is_advisory()
                {
                    error!("failed to stop syncthing: {e}");
                }
            }
            DaemonHandle::Adopted { port } => {
                info!("leaving syncthing on port {port} running");
                self.slot().handle = DaemonHandle::None;
            }
            DaemonHandle::None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ListenerInfo, ListenerSource};
    use crate::discovery::Locations;

    struct NoListeners;

    impl ListenerSource for NoListeners {
        fn listeners(&self) -> Result<Vec<ListenerInfo>, String> {
            Ok(vec![])
        }
    }

    fn supervisor(settings: Settings) -> Arc<Supervisor> {
        let verifier = Arc::new(ExecutableVerifier::new());
        Supervisor::with_opts(
            settings,
            SupervisorOpts {
                resolver: PathResolver::with_locations(Locations::empty(), verifier.clone()),
                verifier,
                detector: RunningInstanceDetector::new(Box::new(NoListeners)),
                procs: PROCS.clone(),
                workspace: PathBuf::from("/tmp/workspace"),
                daemon_log: PathBuf::from("/tmp/workspace/syncthing.log"),
            },
        )
    }

    #[test]
    fn test_initial_status() {
        let sup = supervisor(Settings::default());
        let status = sup.status();
        assert_eq!(status.state, SupervisorState::Stopped);
        assert!(!status.running);
        assert_eq!(status.port, None);
        assert_eq!(sup.gui_url(), None);
        assert_eq!(
            sup.home().path(),
            PathBuf::from("/tmp/workspace/.syncwarden")
        );
    }

    #[test]
    fn test_state_follows_handle_and_transition() {
        let sup = supervisor(Settings::default());
        sup.slot().handle = DaemonHandle::Adopted { port: 8384 };
        assert_eq!(sup.state(), SupervisorState::Adopted);
        assert_eq!(sup.gui_url().as_deref(), Some("http://127.0.0.1:8384"));
        sup.slot().transition = Some(SupervisorState::Stopping);
        assert_eq!(sup.state(), SupervisorState::Stopping);
    }

    #[test]
    fn test_notifications_respect_setting() {
        let sup = supervisor(Settings {
            show_notifications: false,
            ..Default::default()
        });
        sup.notify(LevelFilter::Info, "sync triggered");
        sup.notify(LevelFilter::Error, "syncthing stopped unexpectedly");
        let notes = sup.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, LevelFilter::Error);
        assert!(sup.take_notifications().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_leaves_adopted_daemon() {
        let sup = supervisor(Settings::default());
        sup.slot().handle = DaemonHandle::Adopted { port: 8384 };
        sup.shutdown().await;
        assert_eq!(sup.state(), SupervisorState::Stopped);
    }
}
