//! Finding a syncthing that is already listening, so it can be adopted
//! instead of spawning a second one.

use crate::discovery::PRODUCT_NAME;
use crate::settings::{DEFAULT_PORT, Settings};
use itertools::Itertools;

/// Ports a syncthing started elsewhere usually listens on, after the preferred one.
pub const ADOPTION_PORTS: [u16; 3] = [DEFAULT_PORT, 8080, 22000];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub pid: u32,
    pub name: String,
    pub port: u16,
}

/// Source of the OS socket table.
pub trait ListenerSource: Send + Sync {
    fn listeners(&self) -> Result<Vec<ListenerInfo>, String>;
}

/// Socket table from the OS.
#[derive(Debug, Default)]
pub struct SystemListeners;

impl ListenerSource for SystemListeners {
    fn listeners(&self) -> Result<Vec<ListenerInfo>, String> {
        let all = listeners::get_all().map_err(|e| e.to_string())?;
        Ok(all
            .into_iter()
            .map(|l| ListenerInfo {
                pid: l.process.pid,
                name: l.process.name,
                port: l.socket.port(),
            })
            .collect())
    }
}

pub struct RunningInstanceDetector {
    source: Box<dyn ListenerSource>,
}

impl Default for RunningInstanceDetector {
    fn default() -> Self {
        Self::new(Box::new(SystemListeners))
    }
}

impl RunningInstanceDetector {
    pub fn new(source: Box<dyn ListenerSource>) -> Self {
        Self { source }
    }

    /// `preferred` followed by the well-known ports, without duplicates.
    pub fn candidate_ports(preferred: u16) -> Vec<u16> {
        std::iter::once(preferred)
            .chain(ADOPTION_PORTS)
            .unique()
            .collect()
    }

    /// First of `ports` with a syncthing process listening on it. Listeners
    /// owned by anything else do not count.
    pub fn running_port(&self, ports: &[u16]) -> Option<u16> {
        let listeners = match self.source.listeners() {
            Ok(listeners) => listeners,
            Err(e) => {
                warn!("could not enumerate listening sockets: {e}");
                return None;
            }
        };
        ports.iter().copied().find(|port| {
            let on_port = listeners.iter().filter(|l| l.port == *port).collect_vec();
            let found = on_port.iter().find(|l| is_syncthing(&l.name));
            match found {
                Some(l) => {
                    debug!("syncthing (pid {}) is listening on {port}", l.pid);
                    true
                }
                None => {
                    if let Some(l) = on_port.first() {
                        debug!("port {port} is held by {} (pid {}), not adopting", l.name, l.pid);
                    }
                    false
                }
            }
        })
    }

    pub fn is_running(&self, ports: &[u16]) -> bool {
        self.running_port(ports).is_some()
    }

    /// Look for a running instance on the candidate ports. A hit on a port other
    /// than the preferred one becomes the new preferred port.
    pub fn detect_and_record(&self, settings: &mut Settings) -> Option<u16> {
        let port = self.running_port(&Self::candidate_ports(settings.port))?;
        if port != settings.port {
            info!("found running syncthing on port {port}, remembering it");
            settings.port = port;
            if let Err(e) = settings.persist(|s| s.port = port) {
                warn!("failed to save port {port}: {e}");
            }
        }
        Some(port)
    }
}

fn is_syncthing(process_name: &str) -> bool {
    process_name.to_lowercase().contains(PRODUCT_NAME)
}
