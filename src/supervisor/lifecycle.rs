//! Daemon lifecycle: start (adopt or spawn), stop, restart, and the task that
//! watches an owned child until it exits.

use super::Supervisor;
use crate::daemon::DaemonHandle;
use crate::daemon_status::{ExitReport, SupervisorState};
use crate::discovery::{DiscoveryResult, EXE_NAME};
use crate::error::SupervisorError;
use crate::home::HomeDirectory;
use crate::port;
use log::LevelFilter;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tokio::process::Child;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::time;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// How long to wait for the child to be reaped after a force kill
const KILL_WAIT: Duration = Duration::from_secs(2);
/// Per-line budget when draining output after the child exited
const DRAIN_WAIT: Duration = Duration::from_millis(200);
/// How often a daemon we hold no handle to is checked for exit
const DETACHED_POLL: Duration = Duration::from_millis(100);

/// Arguments for an owned daemon. Self-restart is disabled; restarts are ours.
pub fn daemon_args(home: &Path, port: u16) -> Vec<String> {
    vec![
        "--home".to_string(),
        home.to_string_lossy().to_string(),
        "--gui-address".to_string(),
        format!("127.0.0.1:{port}"),
        "--no-browser".to_string(),
        "--no-restart".to_string(),
    ]
}

fn is_port_conflict(line: &str) -> bool {
    line.to_lowercase().contains("address already in use")
}

impl Supervisor {
    /// Adopt a syncthing that is already listening, or spawn our own.
    ///
    /// Rejected with `AlreadyRunning` while a daemon is live or another
    /// transition is in flight; nothing is spawned in that case.
    pub async fn start(self: &Arc<Self>) -> Result<DaemonHandle, SupervisorError> {
        let Ok(_guard) = self.lifecycle_lock.try_lock() else {
            let port = self.handle().port().unwrap_or(self.settings().port);
            return Err(self.advise(SupervisorError::AlreadyRunning { port }));
        };
        let live_port = self.handle().port();
        if let Some(port) = live_port {
            return Err(self.advise(SupervisorError::AlreadyRunning { port }));
        }

        self.slot().transition = Some(SupervisorState::Starting);
        let result = self.start_locked().await;
        let mut slot = self.slot();
        slot.transition = None;
        match result {
            Ok(handle) => Ok(handle),
            Err(e) => {
                slot.handle = DaemonHandle::None;
                slot.exited = None;
                drop(slot);
                self.notify(LevelFilter::Error, format!("failed to start syncthing: {e}"));
                Err(e)
            }
        }
    }

    async fn start_locked(self: &Arc<Self>) -> Result<DaemonHandle, SupervisorError> {
        let mut settings = self.settings();
        if let Some(port) = self.detector.detect_and_record(&mut settings) {
            self.store_settings(settings);
            let handle = DaemonHandle::Adopted { port };
            {
                let mut slot = self.slot();
                slot.handle = handle.clone();
                slot.executable = None;
                slot.exited = None;
            }
            self.notify(
                LevelFilter::Info,
                format!("using syncthing already running on port {port}"),
            );
            return Ok(handle);
        }

        let (path, strategy) = match self.resolver.resolve(&settings).await {
            DiscoveryResult::Found { path, strategy } => (path, strategy),
            DiscoveryResult::NotFound => return Err(SupervisorError::NotFound),
        };
        if !self.verifier.verify(&path).await {
            return Err(SupervisorError::VerificationFailed { path });
        }
        if strategy.is_auto_detected() {
            remember_executable(&mut settings, &path);
        }
        let port = port::allocate(&mut settings)?;
        let home = HomeDirectory::new(settings.home_dir_for(&self.workspace));
        self.store_settings(settings);

        home.ensure().map_err(|source| SupervisorError::SpawnFailed {
            path: home.path().to_path_buf(),
            source,
        })?;
        self.reap_orphans(&path, home.path());
        home.clean_stale_locks();
        self.spawn(path, port, home).await
    }

    /// Adopt a running syncthing without ever spawning one.
    pub async fn attach(self: &Arc<Self>) -> Result<DaemonHandle, SupervisorError> {
        let _guard = self.lifecycle_lock.lock().await;
        let handle = self.handle();
        if handle.is_live() {
            return Ok(handle);
        }
        let mut settings = self.settings();
        let port = self
            .detector
            .detect_and_record(&mut settings)
            .ok_or(SupervisorError::NotRunning)?;
        self.store_settings(settings);
        let handle = DaemonHandle::Adopted { port };
        self.slot().handle = handle.clone();
        Ok(handle)
    }

    /// Run the auto-detection strategies and remember what they find.
    pub async fn detect_executable(&self) -> DiscoveryResult {
        let result = self.resolver.detect().await;
        if let Some(path) = result.path() {
            let mut settings = self.settings();
            remember_executable(&mut settings, path);
            self.store_settings(settings);
        }
        result
    }

    /// Force-kill daemons left running against `home` before a fresh launch.
    fn reap_orphans(&self, exe: &Path, home: &Path) -> usize {
        let orphans = self.procs.find_orphans(&exe_name_of(Some(exe)), home);
        for pid in &orphans {
            warn!(
                "killing leftover syncthing (pid {pid}) for {}",
                home.display()
            );
            self.procs.kill(*pid);
        }
        orphans.len()
    }

    /// Stop a daemon left running against our home by another session: a
    /// graceful terminate, then a force kill for whatever is still alive
    /// after `stop_timeout`. Returns once they are gone, with how many there were.
    pub async fn stop_detached(&self) -> usize {
        let settings = self.settings();
        let exe = settings.manual_path().or_else(|| settings.cached_path());
        let home = self.home();
        let pids = self.procs.find_orphans(&exe_name_of(exe.as_deref()), home.path());
        for pid in &pids {
            info!("stopping syncthing (pid {pid}) for {}", home.path().display());
            self.procs.terminate(*pid);
        }

        let deadline = time::Instant::now() + settings.stop_timeout();
        for pid in &pids {
            while self.procs.is_running(*pid) && time::Instant::now() < deadline {
                time::sleep(DETACHED_POLL).await;
            }
            if self.procs.is_running(*pid) {
                warn!("syncthing (pid {pid}) did not exit in time, killing it");
                self.procs.kill(*pid);
                let killed = time::Instant::now() + KILL_WAIT;
                while self.procs.is_running(*pid) && time::Instant::now() < killed {
                    time::sleep(DETACHED_POLL).await;
                }
            }
        }
        pids.len()
    }

    async fn spawn(
        self: &Arc<Self>,
        path: PathBuf,
        port: u16,
        home: HomeDirectory,
    ) -> Result<DaemonHandle, SupervisorError> {
        let args = daemon_args(home.path(), port);
        info!("spawning {} {}", path.display(), shell_words::join(&args));
        let mut cmd = tokio::process::Command::new(&path);
        cmd.args(&args)
            .current_dir(home.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd.spawn().map_err(|source| SupervisorError::SpawnFailed {
            path: path.clone(),
            source,
        })?;
        let Some(pid) = child.id() else {
            return Err(SupervisorError::SpawnFailed {
                path,
                source: io::Error::other("process exited before its pid could be read"),
            });
        };

        let handle = DaemonHandle::Owned {
            pid,
            port,
            home: home.path().to_path_buf(),
        };
        let (exited_tx, exited_rx) = watch::channel(false);
        {
            let mut slot = self.slot();
            slot.handle = handle.clone();
            slot.stop_requested = false;
            slot.executable = Some(path);
            slot.exited = Some(exited_rx);
        }
        tokio::spawn(self.clone().monitor(child, pid, port, exited_tx));
        self.notify(LevelFilter::Info, format!("syncthing started on port {port}"));
        Ok(handle)
    }

    async fn monitor(
        self: Arc<Self>,
        mut child: Child,
        pid: u32,
        port: u16,
        exited_tx: watch::Sender<bool>,
    ) {
        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            error!("failed to capture output of syncthing (pid {pid})");
            return;
        };
        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let mut log = self.open_daemon_log().await;

        let (exit_tx, mut exit_rx) = mpsc::channel::<io::Result<ExitStatus>>(1);
        tokio::spawn(async move {
            let result = child.wait().await;
            debug!("syncthing pid {pid} wait() completed with result: {result:?}");
            let _ = exit_tx.send(result).await;
        });

        let mut flush_interval = time::interval(Duration::from_millis(500));
        let mut conflict_reported = false;
        let result = loop {
            select! {
                Ok(Some(line)) = stdout.next_line() => {
                    append(&mut log, "stdout", &line).await;
                }
                Ok(Some(line)) = stderr.next_line() => {
                    append(&mut log, "stderr", &line).await;
                    if !conflict_reported && is_port_conflict(&line) {
                        conflict_reported = true;
                        self.notify(
                            LevelFilter::Error,
                            format!("port {port} is already in use by another program; change `port` in the settings"),
                        );
                    }
                }
                Some(result) = exit_rx.recv() => break result,
                _ = flush_interval.tick() => {
                    if let Some(w) = log.as_mut()
                        && let Err(e) = w.flush().await
                    {
                        error!("failed to flush syncthing log: {e}");
                    }
                }
            }
        };

        drain(&mut stdout, &mut log, "stdout").await;
        drain(&mut stderr, &mut log, "stderr").await;
        if let Some(w) = log.as_mut()
            && let Err(e) = w.flush().await
        {
            error!("failed to flush syncthing log: {e}");
        }

        self.on_exit(pid, result);
        let _ = exited_tx.send(true);
    }

    async fn open_daemon_log(&self) -> Option<BufWriter<File>> {
        if let Some(parent) = self.daemon_log.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            error!("failed to create {}: {e}", parent.display());
            return None;
        }
        match File::options()
            .append(true)
            .create(true)
            .open(&self.daemon_log)
            .await
        {
            Ok(f) => Some(BufWriter::new(f)),
            Err(e) => {
                error!("failed to open {}: {e}", self.daemon_log.display());
                None
            }
        }
    }

    /// Record how the owned child `pid` ended. Exits of a child that is no
    /// longer the current handle are ignored.
    fn on_exit(&self, pid: u32, result: io::Result<ExitStatus>) {
        let report = {
            let mut slot = self.slot();
            if slot.handle.pid() != Some(pid) {
                debug!("ignoring exit of superseded syncthing pid {pid}");
                return;
            }
            let report = match &result {
                _ if slot.stop_requested => ExitReport::Stopped,
                Ok(status) if status.success() => ExitReport::Clean,
                Ok(status) => ExitReport::Crashed(status.code()),
                Err(e) => {
                    warn!("lost track of syncthing pid {pid}: {e}");
                    ExitReport::Crashed(None)
                }
            };
            slot.handle = DaemonHandle::None;
            slot.stop_requested = false;
            slot.last_exit = Some(report.clone());
            report
        };
        info!("syncthing (pid {pid}) exited: {report}");
        if let ExitReport::Crashed(code) = report {
            self.notify(
                LevelFilter::Error,
                SupervisorError::CrashExit { code }.to_string(),
            );
        }
    }

    /// Stop whatever handle is held. An owned child gets a graceful terminate,
    /// then a force kill after `stop_timeout`; an adopted daemon is only released.
    pub async fn stop(self: &Arc<Self>) -> Result<(), SupervisorError> {
        let _guard = self.lifecycle_lock.lock().await;
        self.stop_locked()
            .await
            .map_err(|e| if e.is_advisory() { self.advise(e) } else { e })
    }

    async fn stop_locked(&self) -> Result<(), SupervisorError> {
        let (handle, exited) = {
            let slot = self.slot();
            (slot.handle.clone(), slot.exited.clone())
        };
        match handle {
            DaemonHandle::None => Err(SupervisorError::NotRunning),
            DaemonHandle::Adopted { port } => {
                info!("releasing syncthing on port {port}; it was not started by us");
                self.slot().handle = DaemonHandle::None;
                Ok(())
            }
            DaemonHandle::Owned { pid, .. } => {
                {
                    let mut slot = self.slot();
                    slot.transition = Some(SupervisorState::Stopping);
                    slot.stop_requested = true;
                }
                info!("stopping syncthing (pid {pid})");
                self.procs.terminate(pid);

                let timeout = self.settings().stop_timeout();
                if !wait_exited(exited.clone(), timeout).await {
                    warn!("syncthing (pid {pid}) did not exit within {timeout:?}, killing it");
                    self.procs.kill(pid);
                    wait_exited(exited, KILL_WAIT).await;
                }

                {
                    let mut slot = self.slot();
                    if slot.handle.pid() == Some(pid) {
                        slot.handle = DaemonHandle::None;
                        slot.last_exit = Some(ExitReport::Stopped);
                    }
                    slot.stop_requested = false;
                    slot.transition = None;
                }
                self.notify(LevelFilter::Info, "syncthing stopped");
                Ok(())
            }
        }
    }

    /// Stop, let the daemon release its port and locks, start again.
    pub async fn restart(self: &Arc<Self>) -> Result<DaemonHandle, SupervisorError> {
        {
            let _guard = self.lifecycle_lock.lock().await;
            match self.stop_locked().await {
                Ok(()) | Err(SupervisorError::NotRunning) => {}
                Err(e) => return Err(e),
            }
        }
        let delay = self.settings().restart_delay();
        debug!("restarting syncthing in {delay:?}");
        time::sleep(delay).await;
        self.start().await
    }

    /// Queue an advisory error as an informational notice.
    pub(crate) fn advise(&self, err: SupervisorError) -> SupervisorError {
        self.notify(LevelFilter::Info, err.to_string());
        err
    }
}

fn exe_name_of(exe: Option<&Path>) -> String {
    exe.and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| EXE_NAME.to_string())
}

fn remember_executable(settings: &mut crate::settings::Settings, path: &Path) {
    let value = path.to_string_lossy().to_string();
    if settings.syncthing_path == value {
        return;
    }
    settings.syncthing_path = value.clone();
    if let Err(e) = settings.persist(|s| s.syncthing_path = value) {
        warn!("failed to remember syncthing path: {e}");
    }
}

/// True once the child has been reaped, false if `timeout` passed first.
async fn wait_exited(exited: Option<watch::Receiver<bool>>, timeout: Duration) -> bool {
    let Some(mut exited) = exited else {
        return false;
    };
    time::timeout(timeout, async move {
        let _ = exited.wait_for(|done| *done).await;
    })
    .await
    .is_ok()
}

async fn append(log: &mut Option<BufWriter<File>>, stream: &str, line: &str) {
    trace!("syncthing {stream}: {line}");
    if let Some(w) = log.as_mut() {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let formatted = format!("{now} {stream} {line}\n");
        if let Err(e) = w.write_all(formatted.as_bytes()).await {
            error!("failed to write syncthing log: {e}");
        }
    }
}

/// Pick up output written just before exit without waiting on pipes that a
/// grandchild may still hold open.
async fn drain<R>(lines: &mut Lines<BufReader<R>>, log: &mut Option<BufWriter<File>>, stream: &str)
where
    R: tokio::io::AsyncRead + Unpin,
{
    while let Ok(Ok(Some(line))) = time::timeout(DRAIN_WAIT, lines.next_line()).await {
        append(log, stream, &line).await;
    }
}
