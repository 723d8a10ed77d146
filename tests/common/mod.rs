#![allow(dead_code)]

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use syncwarden::detect::{ListenerInfo, ListenerSource, RunningInstanceDetector};
use syncwarden::discovery::{Locations, PathResolver};
use syncwarden::procs::{PROCS, ProcessControl};
use syncwarden::settings::Settings;
use syncwarden::supervisor::{Supervisor, SupervisorOpts};
use syncwarden::verify::ExecutableVerifier;
use tempfile::TempDir;

pub const VERSION_BANNER: &str = "syncthing v1.27.12 \"Gold Grasshopper\" (go1.22.7 linux-amd64)";

/// Socket table with fixed entries.
pub struct FakeListeners(pub Vec<ListenerInfo>);

impl ListenerSource for FakeListeners {
    fn listeners(&self) -> Result<Vec<ListenerInfo>, String> {
        Ok(self.0.clone())
    }
}

/// Real process control that remembers every signal it was asked to send.
#[derive(Default)]
pub struct RecordingProcs {
    pub signals: Mutex<Vec<(&'static str, u32)>>,
}

impl RecordingProcs {
    pub fn signals(&self) -> Vec<(&'static str, u32)> {
        self.signals.lock().unwrap().clone()
    }
}

impl ProcessControl for RecordingProcs {
    fn is_running(&self, pid: u32) -> bool {
        PROCS.is_running(pid)
    }

    fn terminate(&self, pid: u32) -> bool {
        self.signals.lock().unwrap().push(("terminate", pid));
        PROCS.terminate(pid)
    }

    fn kill(&self, pid: u32) -> bool {
        self.signals.lock().unwrap().push(("kill", pid));
        PROCS.kill(pid)
    }

    fn find_orphans(&self, exe_name: &str, home: &Path) -> Vec<u32> {
        PROCS.find_orphans(exe_name, home)
    }
}

/// Isolated workspace, settings file and fake executables
pub struct TestEnv {
    temp_dir: TempDir,
    pub procs: Arc<RecordingProcs>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("workspace")).unwrap();
        Self {
            temp_dir,
            procs: Arc::new(RecordingProcs::default()),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn workspace(&self) -> PathBuf {
        self.path().join("workspace")
    }

    pub fn home(&self) -> PathBuf {
        self.workspace().join(".syncwarden")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.path().join("config").join("settings.toml")
    }

    pub fn daemon_log(&self) -> PathBuf {
        self.path().join("logs").join("syncthing.log")
    }

    pub fn read_daemon_log(&self) -> String {
        fs::read_to_string(self.daemon_log()).unwrap_or_default()
    }

    /// Settings bound to this env's file, preferring a port that is free right now.
    pub fn settings(&self) -> Settings {
        Settings {
            port: free_port(),
            restart_delay: "100ms".to_string(),
            ..Default::default()
        }
        .with_path(self.settings_path())
    }

    /// Write an executable shell script to `bin/<name>`.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = self.path().join("bin");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// A `syncthing` that answers `--version`, prints a line, runs `extra`,
    /// records the launch and its arguments, then idles until SIGTERM.
    /// A recorded launch means the signal handling is in place.
    pub fn fake_syncthing_with(&self, extra: &str) -> PathBuf {
        let launches = self.launches_path();
        let args = self.path().join("args");
        self.script(
            "syncthing",
            &format!(
                r#"if [ "$1" = "--version" ]; then echo '{VERSION_BANNER}'; exit 0; fi
trap 'exit 0' TERM
echo "[ABCDE] INFO: syncthing starting in $(pwd)"
{extra}
echo "$@" > '{args}'
echo launch >> '{launches}'
while true; do sleep 0.1; done"#,
                launches = launches.display(),
                args = args.display(),
            ),
        )
    }

    pub fn fake_syncthing(&self) -> PathBuf {
        self.fake_syncthing_with("")
    }

    fn launches_path(&self) -> PathBuf {
        self.path().join("launches")
    }

    /// How many times a fake daemon was launched (version checks excluded).
    pub fn launches(&self) -> usize {
        fs::read_to_string(self.launches_path())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Arguments the last fake daemon was launched with.
    pub fn last_args(&self) -> String {
        fs::read_to_string(self.path().join("args"))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    pub fn supervisor(&self, settings: Settings) -> Arc<Supervisor> {
        self.supervisor_with(settings, Locations::empty(), vec![])
    }

    pub fn supervisor_with(
        &self,
        settings: Settings,
        locations: Locations,
        listeners: Vec<ListenerInfo>,
    ) -> Arc<Supervisor> {
        let verifier = Arc::new(ExecutableVerifier::new());
        Supervisor::with_opts(
            settings,
            SupervisorOpts {
                resolver: PathResolver::with_locations(locations, verifier.clone()),
                verifier,
                detector: RunningInstanceDetector::new(Box::new(FakeListeners(listeners))),
                procs: self.procs.clone(),
                workspace: self.workspace(),
                daemon_log: self.daemon_log(),
            },
        )
    }
}

/// A port nothing is listening on at the moment of the call.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn syncthing_listener(port: u16) -> ListenerInfo {
    ListenerInfo {
        pid: 4242,
        name: "syncthing".to_string(),
        port,
    }
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}
