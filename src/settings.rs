//! User-configurable settings for syncwarden.
//!
//! Settings are read from `~/.config/syncwarden/settings.toml` (or
//! `$SYNCWARDEN_CONFIG_DIR/settings.toml`). Missing keys take their defaults,
//! then a few environment variables override the file:
//!
//! - `SYNCWARDEN_PORT`
//! - `SYNCWARDEN_MANUAL_PATH`
//! - `SYNCWARDEN_AUTO_START`
//!
//! Example:
//! ```toml
//! manual_path = "/opt/syncthing/syncthing"
//! port = 8384
//! sync_interval = "10m"
//! ```
//!
//! The supervisor writes back `syncthing_path` after a successful
//! auto-detection and `port` when the preferred port was busy. Writes patch
//! only those keys into the file, so environment overrides and one-off
//! values never end up persisted.

use crate::error::{ConfigParseError, FileError};
use crate::{Result, env};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8384;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Executable chosen by the user; overrides auto-detection
    pub manual_path: String,
    /// Last auto-detected executable
    pub syncthing_path: String,
    /// Preferred GUI/REST port
    pub port: u16,
    pub auto_start: bool,
    /// Allow `syncwarden open` to launch the web UI
    pub web_ui_enabled: bool,
    /// How often to ask the daemon to rescan; "0s" disables
    pub sync_interval: String,
    pub show_notifications: bool,
    pub api_key: String,
    /// Daemon home; empty means `<workspace>/.syncwarden`
    pub home_dir: String,
    pub restart_delay: String,
    pub stop_timeout: String,
    /// Backing file; `None` keeps the settings in memory only
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manual_path: String::new(),
            syncthing_path: String::new(),
            port: DEFAULT_PORT,
            auto_start: false,
            web_ui_enabled: true,
            sync_interval: "5m".to_string(),
            show_notifications: true,
            api_key: String::new(),
            home_dir: String::new(),
            restart_delay: "2s".to_string(),
            stop_timeout: "5s".to_string(),
            path: None,
        }
    }
}

impl Settings {
    /// Load from the default settings file, then overlay environment variables.
    pub fn load() -> Result<Self> {
        let mut settings = Self::read(&*env::SYNCWARDEN_SETTINGS_FILE)?;
        settings.load_from_env();
        Ok(settings)
    }

    /// Read settings from `path`. A missing file yields the defaults, bound to `path`.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default().with_path(path));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| FileError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&raw)
            .map_err(|err| ConfigParseError::from_toml_error(path, raw.clone(), err))?;
        Ok(settings.with_path(path))
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Apply `patch` to the values stored in the bound file and write them
    /// back. Everything the patch does not touch keeps its on-disk value, so
    /// in-memory overrides are not persisted. Settings without a file are
    /// kept in memory only.
    pub fn persist(&self, patch: impl FnOnce(&mut Settings)) -> Result<()> {
        let Some(path) = &self.path else {
            trace!("settings have no backing file, not saving");
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            xx::file::mkdirp(parent)?;
        }
        let _lock = xx::fslock::get(path, false)?;
        let mut stored = Self::read(path)?;
        patch(&mut stored);
        let raw = toml::to_string_pretty(&stored).map_err(|e| FileError::WriteError {
            path: path.clone(),
            details: Some(format!("serialization failed: {e}")),
        })?;
        xx::file::write(path, raw).map_err(|e| FileError::WriteError {
            path: path.clone(),
            details: Some(e.to_string()),
        })?;
        debug!("saved settings to {}", path.display());
        Ok(())
    }

    pub fn load_from_env(&mut self) {
        if let Some(port) = env::var_u16("SYNCWARDEN_PORT") {
            self.port = port;
        }
        if let Some(path) = env::var_path("SYNCWARDEN_MANUAL_PATH") {
            self.manual_path = path.to_string_lossy().to_string();
        }
        if env::var_true("SYNCWARDEN_AUTO_START") {
            self.auto_start = true;
        } else if env::var_false("SYNCWARDEN_AUTO_START") {
            self.auto_start = false;
        }
    }

    pub fn manual_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.manual_path)
    }

    pub fn cached_path(&self) -> Option<PathBuf> {
        non_empty_path(&self.syncthing_path)
    }

    /// The daemon's home directory for `workspace`, always absolute: the
    /// daemon runs with its home as cwd and would resolve a relative
    /// `--home` a second time.
    pub fn home_dir_for(&self, workspace: &Path) -> PathBuf {
        let home = non_empty_path(&self.home_dir).unwrap_or_else(|| workspace.join(".syncwarden"));
        std::path::absolute(&home).unwrap_or(home)
    }

    pub fn home_dir(&self) -> PathBuf {
        self.home_dir_for(&env::SYNCWARDEN_WORKSPACE)
    }

    /// Parse a duration string (humantime format) to Duration
    pub fn parse_duration(s: &str) -> Option<Duration> {
        humantime::parse_duration(s).ok()
    }

    /// `None` when periodic sync is disabled.
    pub fn sync_interval(&self) -> Option<Duration> {
        let interval = duration_or(&self.sync_interval, Duration::from_secs(300));
        (!interval.is_zero()).then_some(interval)
    }

    pub fn restart_delay(&self) -> Duration {
        duration_or(&self.restart_delay, Duration::from_secs(2))
    }

    pub fn stop_timeout(&self) -> Duration {
        duration_or(&self.stop_timeout, Duration::from_secs(5))
    }
}

fn duration_or(value: &str, default: Duration) -> Duration {
    Settings::parse_duration(value).unwrap_or_else(|| {
        warn!("invalid duration '{value}', using {}", humantime::format_duration(default));
        default
    })
}

fn non_empty_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.port, 8384);
        assert!(!settings.auto_start);
        assert!(settings.show_notifications);
        assert!(settings.web_ui_enabled);
        assert_eq!(settings.sync_interval(), Some(Duration::from_secs(300)));
        assert_eq!(settings.restart_delay(), Duration::from_secs(2));
        assert_eq!(settings.stop_timeout(), Duration::from_secs(5));
        assert!(settings.manual_path().is_none());
        assert!(settings.cached_path().is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
manual_path = "/opt/syncthing/syncthing"
port = 9000
"#,
        )
        .unwrap();

        assert_eq!(
            settings.manual_path(),
            Some(PathBuf::from("/opt/syncthing/syncthing"))
        );
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.sync_interval, "5m");
        assert!(settings.show_notifications);
    }

    #[test]
    fn test_zero_interval_disables_sync() {
        let settings = Settings {
            sync_interval: "0s".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.sync_interval(), None);
    }

    #[test]
    fn test_invalid_duration_fallback() {
        let settings = Settings {
            sync_interval: "soon".to_string(),
            restart_delay: "later".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.sync_interval(), Some(Duration::from_secs(300)));
        assert_eq!(settings.restart_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_whitespace_paths_are_unset() {
        let settings = Settings {
            manual_path: "   ".to_string(),
            ..Default::default()
        };
        assert!(settings.manual_path().is_none());
    }

    #[test]
    fn test_home_dir_defaults_under_workspace() {
        let settings = Settings::default();
        assert_eq!(
            settings.home_dir_for(Path::new("/vault")),
            PathBuf::from("/vault/.syncwarden")
        );

        let settings = Settings {
            home_dir: "/srv/st-home".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.home_dir_for(Path::new("/vault")),
            PathBuf::from("/srv/st-home")
        );
    }

    #[test]
    fn test_save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let settings = Settings::read(&path).unwrap();
        assert_eq!(settings.path.as_deref(), Some(path.as_path()));
        settings
            .persist(|s| {
                s.port = 8385;
                s.syncthing_path = "/usr/bin/syncthing".to_string();
            })
            .unwrap();

        let reread = Settings::read(&path).unwrap();
        assert_eq!(reread.port, 8385);
        assert_eq!(reread.cached_path(), Some(PathBuf::from("/usr/bin/syncthing")));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();

        let err = Settings::read(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse settings"));
    }

    #[test]
    fn test_save_without_path_is_noop() {
        Settings::default().persist(|s| s.port = 9000).unwrap();
    }

    #[test]
    fn test_persist_keeps_overrides_out_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "port = 9000\nsync_interval = \"1m\"\n").unwrap();

        let mut settings = Settings::read(&path).unwrap();
        // what an environment overlay or a command line flag would do
        settings.manual_path = "/tmp/one-off/syncthing".to_string();
        settings.auto_start = true;
        settings.port = 9100;
        settings.persist(|s| s.syncthing_path = "/usr/bin/syncthing".to_string()).unwrap();

        let stored = Settings::read(&path).unwrap();
        assert_eq!(stored.manual_path(), None);
        assert!(!stored.auto_start);
        assert_eq!(stored.port, 9000);
        assert_eq!(stored.sync_interval, "1m");
        assert_eq!(stored.cached_path(), Some(PathBuf::from("/usr/bin/syncthing")));
    }

    #[test]
    fn test_relative_home_is_made_absolute() {
        let settings = Settings::default();
        let home = settings.home_dir_for(Path::new("vault"));
        assert!(home.is_absolute());
        assert_eq!(home, env::current_dir().unwrap().join("vault").join(".syncwarden"));

        let settings = Settings {
            home_dir: "st-home".to_string(),
            ..Default::default()
        };
        assert!(settings.home_dir_for(Path::new("/vault")).is_absolute());
    }
}
