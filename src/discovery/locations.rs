use super::{EXE_NAME, LOOKUP_TIMEOUT, PRODUCT_NAME};
use crate::env;
use std::path::PathBuf;
use std::time::Duration;

const SCAN_DEPTH: usize = 3;
const SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Where to look, and how hard.
#[derive(Debug, Clone)]
pub struct Locations {
    pub exe_name: String,
    /// Checked in order, each verified
    pub common: Vec<PathBuf>,
    /// Commands whose first output line names the executable
    pub lookup_commands: Vec<Vec<String>>,
    pub lookup_timeout: Duration,
    /// Shortcut and registry introspection
    pub windows: bool,
    pub shortcuts: Vec<PathBuf>,
    pub scan_roots: Vec<PathBuf>,
    pub scan_depth: usize,
    pub scan_timeout: Duration,
}

impl Locations {
    /// No strategies beyond the settings-based ones.
    pub fn empty() -> Self {
        Self {
            exe_name: EXE_NAME.to_string(),
            common: vec![],
            lookup_commands: vec![],
            lookup_timeout: LOOKUP_TIMEOUT,
            windows: false,
            shortcuts: vec![],
            scan_roots: vec![],
            scan_depth: SCAN_DEPTH,
            scan_timeout: SCAN_TIMEOUT,
        }
    }

    pub fn for_current_os() -> Self {
        Self {
            common: common_paths(),
            lookup_commands: lookup_commands(),
            windows: cfg!(windows),
            shortcuts: if cfg!(windows) { shortcut_paths() } else { vec![] },
            scan_roots: scan_roots(),
            ..Self::empty()
        }
    }
}

/// `<data dir>/bin/<os>-<arch>/syncthing`, where a bundled copy would be unpacked
pub fn bundled_path() -> PathBuf {
    env::SYNCWARDEN_DATA_DIR
        .join("bin")
        .join(format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH))
        .join(EXE_NAME)
}

fn env_dir(name: &str, fallback: &str) -> PathBuf {
    env::var_path(name).unwrap_or_else(|| PathBuf::from(fallback))
}

#[cfg(windows)]
fn common_paths() -> Vec<PathBuf> {
    let program_files = env_dir("ProgramFiles", r"C:\Program Files");
    let program_files_x86 = env_dir("ProgramFiles(x86)", r"C:\Program Files (x86)");
    let local_app_data = dirs::data_local_dir().unwrap_or(env::HOME_DIR.join(r"AppData\Local"));
    vec![
        bundled_path(),
        program_files.join("Syncthing").join(EXE_NAME),
        program_files_x86.join("Syncthing").join(EXE_NAME),
        local_app_data.join("Programs").join("Syncthing").join(EXE_NAME),
        local_app_data.join("Syncthing").join(EXE_NAME),
        env::HOME_DIR
            .join("scoop")
            .join("apps")
            .join(PRODUCT_NAME)
            .join("current")
            .join(EXE_NAME),
        env_dir("ProgramData", r"C:\ProgramData")
            .join("chocolatey")
            .join("bin")
            .join(EXE_NAME),
    ]
}

#[cfg(not(windows))]
fn common_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        bundled_path(),
        PathBuf::from("/usr/bin").join(EXE_NAME),
        PathBuf::from("/usr/local/bin").join(EXE_NAME),
        PathBuf::from("/opt/homebrew/bin").join(EXE_NAME),
        PathBuf::from("/snap/bin").join(EXE_NAME),
        env::HOME_DIR.join(".local").join("bin").join(EXE_NAME),
        env::HOME_DIR.join("bin").join(EXE_NAME),
        env::HOME_DIR.join("go").join("bin").join(EXE_NAME),
    ];
    if cfg!(target_os = "macos") {
        paths.push(PathBuf::from(
            "/Applications/Syncthing.app/Contents/Resources/syncthing/syncthing",
        ));
    }
    paths
}

fn lookup_commands() -> Vec<Vec<String>> {
    let argv = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
    if cfg!(windows) {
        vec![
            argv(&["where", PRODUCT_NAME]),
            argv(&[
                "powershell",
                "-NoProfile",
                "-Command",
                "Get-Command syncthing -ErrorAction SilentlyContinue | Select-Object -ExpandProperty Source",
            ]),
        ]
    } else {
        vec![
            argv(&["which", PRODUCT_NAME]),
            argv(&["sh", "-c", "command -v syncthing"]),
        ]
    }
}

fn shortcut_paths() -> Vec<PathBuf> {
    let user_profile = env::var_path("USERPROFILE").unwrap_or(env::HOME_DIR.clone());
    let app_data = env::var_path("APPDATA").unwrap_or(user_profile.join(r"AppData\Roaming"));
    let program_data = env_dir("ProgramData", r"C:\ProgramData");
    let start_menu = |base: PathBuf| {
        base.join("Microsoft")
            .join("Windows")
            .join("Start Menu")
            .join("Programs")
    };
    vec![
        user_profile.join("Desktop").join("Syncthing.lnk"),
        PathBuf::from(r"C:\Users\Public\Desktop\Syncthing.lnk"),
        start_menu(app_data).join("Syncthing.lnk"),
        start_menu(program_data).join("Syncthing.lnk"),
    ]
}

fn scan_roots() -> Vec<PathBuf> {
    if cfg!(windows) {
        vec![
            env_dir("ProgramFiles", r"C:\Program Files"),
            env_dir("ProgramFiles(x86)", r"C:\Program Files (x86)"),
            PathBuf::from(r"C:\"),
            PathBuf::from(r"D:\"),
            PathBuf::from(r"E:\"),
            env::HOME_DIR.clone(),
        ]
    } else {
        let mut roots = vec![
            PathBuf::from("/opt"),
            PathBuf::from("/usr/local"),
            env::HOME_DIR.clone(),
        ];
        if cfg!(target_os = "macos") {
            roots.push(PathBuf::from("/Applications"));
        }
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_os_locations() {
        let locations = Locations::for_current_os();
        assert!(!locations.common.is_empty());
        assert!(locations.common.iter().all(|p| p.ends_with(EXE_NAME)
            || p.file_name().is_some_and(|n| n == PRODUCT_NAME)));
        assert_eq!(locations.scan_depth, 3);
        assert!(!locations.lookup_commands.is_empty());
        assert_eq!(locations.windows, cfg!(windows));
    }

    #[test]
    fn test_bundled_path_is_first() {
        let locations = Locations::for_current_os();
        assert_eq!(locations.common[0], bundled_path());
        let platform = format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH);
        assert!(bundled_path().to_string_lossy().contains(&platform));
    }

    #[test]
    fn test_shortcuts_are_lnk_files() {
        assert!(
            shortcut_paths()
                .iter()
                .all(|p| p.extension().is_some_and(|e| e == "lnk"))
        );
    }
}
