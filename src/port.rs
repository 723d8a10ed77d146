//! GUI/REST port selection on the loopback interface.

use crate::error::SupervisorError;
use crate::settings::Settings;
use std::net::{Ipv4Addr, TcpListener};

/// Ports tried, starting at the preferred one.
pub const PORT_WINDOW: u16 = 100;

/// Whether `port` can be bound on 127.0.0.1 right now. The test listener is
/// dropped immediately.
pub fn is_available(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

/// First bindable port in `preferred..preferred + PORT_WINDOW`.
pub fn find_available(preferred: u16) -> Result<u16, SupervisorError> {
    let end = preferred.saturating_add(PORT_WINDOW - 1);
    (preferred..=end)
        .find(|port| {
            let free = is_available(*port);
            if !free {
                trace!("port {port} is busy");
            }
            free
        })
        .ok_or(SupervisorError::PortExhausted {
            start: preferred,
            end,
        })
}

/// Pick a port for a fresh daemon and remember it when it differs from the preferred one.
pub fn allocate(settings: &mut Settings) -> Result<u16, SupervisorError> {
    let port = find_available(settings.port)?;
    if port != settings.port {
        info!("port {} is in use, using {port}", settings.port);
        settings.port = port;
        if let Err(e) = settings.persist(|s| s.port = port) {
            warn!("failed to save port {port}: {e}");
        }
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_port() -> (TcpListener, u16) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_skips_busy_port() {
        let (_guard, port) = busy_port();
        assert!(!is_available(port));
        let found = find_available(port).unwrap();
        assert!(found > port);
        assert!(found < port.saturating_add(PORT_WINDOW));
        assert!(is_available(found));
    }

    #[test]
    fn test_exhausted_window_at_top_of_range() {
        // the window saturates at 65535, so a busy 65535 leaves nothing
        let Ok(_guard) = TcpListener::bind((Ipv4Addr::LOCALHOST, u16::MAX)) else {
            return;
        };
        match find_available(u16::MAX) {
            Err(SupervisorError::PortExhausted { start, end }) => {
                assert_eq!(start, u16::MAX);
                assert_eq!(end, u16::MAX);
            }
            other => panic!("expected PortExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_allocate_persists_changed_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let (_guard, port) = busy_port();
        let mut settings = Settings {
            port,
            ..Default::default()
        }
        .with_path(&path);

        let allocated = allocate(&mut settings).unwrap();
        assert_ne!(allocated, port);
        assert_eq!(settings.port, allocated);
        assert_eq!(Settings::read(&path).unwrap().port, allocated);
    }

    #[test]
    fn test_allocate_keeps_free_preferred_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let port = {
            let (listener, port) = busy_port();
            drop(listener);
            port
        };
        let mut settings = Settings {
            port,
            ..Default::default()
        }
        .with_path(&path);
        assert_eq!(allocate(&mut settings).unwrap(), port);
        assert!(!path.exists());
    }

    #[test]
    fn test_allocate_only_writes_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let (_guard, port) = busy_port();
        std::fs::write(&path, format!("port = {port}\n")).unwrap();

        let mut settings = Settings::read(&path).unwrap();
        settings.manual_path = "/tmp/one-off/syncthing".to_string();
        let allocated = allocate(&mut settings).unwrap();

        let stored = Settings::read(&path).unwrap();
        assert_eq!(stored.port, allocated);
        assert_eq!(stored.manual_path(), None);
        assert_eq!(settings.manual_path, "/tmp/one-off/syncthing");
    }
}
