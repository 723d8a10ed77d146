use once_cell::sync::Lazy;
pub use std::env::*;
use std::path::PathBuf;

pub static CWD: Lazy<PathBuf> = Lazy::new(|| current_dir().unwrap_or_else(|_| PathBuf::from(".")));

pub static HOME_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::home_dir().unwrap_or_else(|| {
        eprintln!("Warning: Could not determine home directory");
        PathBuf::from("/tmp")
    })
});
pub static SYNCWARDEN_CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    var_path("SYNCWARDEN_CONFIG_DIR").unwrap_or(HOME_DIR.join(".config").join("syncwarden"))
});
pub static SYNCWARDEN_SETTINGS_FILE: Lazy<PathBuf> =
    Lazy::new(|| SYNCWARDEN_CONFIG_DIR.join("settings.toml"));
pub static SYNCWARDEN_STATE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    var_path("SYNCWARDEN_STATE_DIR").unwrap_or(
        dirs::state_dir()
            .unwrap_or(HOME_DIR.join(".local").join("state"))
            .join("syncwarden"),
    )
});
// Bundled executables live under <data dir>/bin/<os>-<arch>/
pub static SYNCWARDEN_DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    var_path("SYNCWARDEN_DATA_DIR").unwrap_or(
        dirs::data_local_dir()
            .unwrap_or(HOME_DIR.join(".local").join("share"))
            .join("syncwarden"),
    )
});
// The workspace whose daemon home we manage; one daemon home per workspace
pub static SYNCWARDEN_WORKSPACE: Lazy<PathBuf> =
    Lazy::new(|| var_path("SYNCWARDEN_WORKSPACE").unwrap_or(CWD.clone()));
pub static SYNCWARDEN_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("SYNCWARDEN_LOG").unwrap_or(log::LevelFilter::Info));
pub static SYNCWARDEN_LOG_FILE_LEVEL: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("SYNCWARDEN_LOG_FILE_LEVEL").unwrap_or(*SYNCWARDEN_LOG));
pub static SYNCWARDEN_LOGS_DIR: Lazy<PathBuf> =
    Lazy::new(|| var_path("SYNCWARDEN_LOGS_DIR").unwrap_or(SYNCWARDEN_STATE_DIR.join("logs")));
pub static SYNCWARDEN_LOG_FILE: Lazy<PathBuf> =
    Lazy::new(|| SYNCWARDEN_LOGS_DIR.join("syncwarden.log"));
pub static DAEMON_LOG_FILE: Lazy<PathBuf> =
    Lazy::new(|| SYNCWARDEN_LOGS_DIR.join("syncthing").join("syncthing.log"));

pub(crate) fn var_path(name: &str) -> Option<PathBuf> {
    var(name)
        .ok()
        .filter(|val| !val.is_empty())
        .map(PathBuf::from)
}

pub(crate) fn var_u16(name: &str) -> Option<u16> {
    var(name).ok().and_then(|val| val.parse().ok())
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}

pub(crate) fn var_true(name: &str) -> bool {
    var(name)
        .map(|val| val.to_lowercase())
        .map(|val| val == "true" || val == "1")
        .unwrap_or(false)
}

pub(crate) fn var_false(name: &str) -> bool {
    var(name)
        .map(|val| val.to_lowercase())
        .map(|val| val == "false" || val == "0")
        .unwrap_or(false)
}
