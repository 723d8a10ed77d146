use crate::daemon_status::{ExitReport, SupervisorState};
use std::fmt::Display;
use std::path::PathBuf;

/// The supervisor's single view of the sync daemon.
///
/// An `Adopted` daemon was found already running; we never signal it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DaemonHandle {
    #[default]
    None,
    Owned { pid: u32, port: u16, home: PathBuf },
    Adopted { port: u16 },
}

impl DaemonHandle {
    pub fn port(&self) -> Option<u16> {
        match self {
            DaemonHandle::None => None,
            DaemonHandle::Owned { port, .. } | DaemonHandle::Adopted { port } => Some(*port),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            DaemonHandle::Owned { pid, .. } => Some(*pid),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self, DaemonHandle::None)
    }

    pub fn ownership(&self) -> Option<Ownership> {
        match self {
            DaemonHandle::None => None,
            DaemonHandle::Owned { .. } => Some(Ownership::Owned),
            DaemonHandle::Adopted { .. } => Some(Ownership::Adopted),
        }
    }
}

impl Display for DaemonHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonHandle::None => write!(f, "none"),
            DaemonHandle::Owned { pid, port, .. } => write!(f, "owned pid {pid} on port {port}"),
            DaemonHandle::Adopted { port } => write!(f, "adopted on port {port}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Owned,
    Adopted,
}

/// Snapshot handed to the host.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Status {
    pub state: SupervisorState,
    pub running: bool,
    pub port: Option<u16>,
    pub ownership: Option<Ownership>,
    pub pid: Option<u32>,
    pub home: Option<PathBuf>,
    pub executable: Option<PathBuf>,
    pub last_exit: Option<ExitReport>,
}
