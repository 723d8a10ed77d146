use once_cell::sync::Lazy;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, UpdateKind};

/// Signals and process-table queries the supervisor needs.
pub trait ProcessControl: Send + Sync {
    fn is_running(&self, pid: u32) -> bool;
    /// Ask the process to exit (SIGTERM on unix).
    fn terminate(&self, pid: u32) -> bool;
    /// Force it.
    fn kill(&self, pid: u32) -> bool;
    /// Leftover daemons named `exe_name` that were started against `home`.
    fn find_orphans(&self, exe_name: &str, home: &Path) -> Vec<u32>;
}

pub struct Procs {
    system: Mutex<sysinfo::System>,
}

pub static PROCS: Lazy<Arc<Procs>> = Lazy::new(|| Arc::new(Procs::new()));

impl Default for Procs {
    fn default() -> Self {
        Self::new()
    }
}

impl Procs {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(sysinfo::System::new()),
        }
    }

    fn lock_system(&self) -> std::sync::MutexGuard<'_, sysinfo::System> {
        self.system.lock().unwrap_or_else(|poisoned| {
            warn!("System mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn refresh_pid(&self, pid: u32) {
        self.lock_system().refresh_processes(
            ProcessesToUpdate::Some(&[sysinfo::Pid::from_u32(pid)]),
            true,
        );
    }

    pub(crate) fn refresh_processes(&self) {
        self.lock_system().refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::OnlyIfNotSet),
        );
    }
}

impl ProcessControl for Procs {
    fn is_running(&self, pid: u32) -> bool {
        self.refresh_pid(pid);
        self.lock_system()
            .process(sysinfo::Pid::from_u32(pid))
            .is_some_and(|p| p.status() != sysinfo::ProcessStatus::Zombie)
    }

    #[cfg(unix)]
    fn terminate(&self, pid: u32) -> bool {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;
        debug!("sending SIGTERM to {pid}");
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => true,
            Err(e) => {
                debug!("SIGTERM to {pid} failed: {e}");
                false
            }
        }
    }

    #[cfg(windows)]
    fn terminate(&self, pid: u32) -> bool {
        // no graceful signal for console-less processes
        self.kill(pid)
    }

    fn kill(&self, pid: u32) -> bool {
        self.refresh_pid(pid);
        if let Some(process) = self.lock_system().process(sysinfo::Pid::from_u32(pid)) {
            debug!("killing process {pid}");
            process.kill()
        } else {
            false
        }
    }

    fn find_orphans(&self, exe_name: &str, home: &Path) -> Vec<u32> {
        self.refresh_processes();
        let own = std::process::id();
        let system = self.lock_system();
        system
            .processes()
            .iter()
            .filter(|(pid, _)| pid.as_u32() != own)
            .filter(|(_, p)| is_daemon_for(p.name(), p.cmd(), exe_name, home))
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }
}

/// Matches on the process name or argv[0], and requires `home` among the arguments.
fn is_daemon_for<S: AsRef<OsStr>>(name: &OsStr, cmd: &[S], exe_name: &str, home: &Path) -> bool {
    let named = |s: &OsStr| {
        Path::new(s)
            .file_name()
            .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(exe_name))
    };
    let is_exe = named(name) || cmd.first().is_some_and(|arg0| named(arg0.as_ref()));
    let home = home.as_os_str();
    is_exe && cmd.iter().any(|arg| arg.as_ref() == home)
}
