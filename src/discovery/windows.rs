//! Shortcut and registry introspection. Both shell out, so they compile
//! everywhere and simply find nothing off Windows.

use super::PRODUCT_NAME;
use super::lookup::run_bounded;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

const UNINSTALL_KEYS: &[&str] = &[
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKLM\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall",
    r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
];

static INSTALL_LOCATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*InstallLocation[ \t]+REG_(?:EXPAND_)?SZ[ \t]+(.+?)[ \t\r]*$")
        .expect("install location pattern is valid")
});

/// Target of a `.lnk` file, if it points at something syncthing-like.
pub(crate) async fn resolve_shortcut(shortcut: &Path, timeout: Duration) -> Option<PathBuf> {
    let argv = vec![
        "powershell".to_string(),
        "-NoProfile".to_string(),
        "-Command".to_string(),
        shortcut_script(shortcut),
    ];
    let stdout = run_bounded(&argv, timeout).await?;
    let target = stdout.trim();
    if target.to_lowercase().contains(PRODUCT_NAME) {
        Some(PathBuf::from(target))
    } else {
        trace!("shortcut {} points at {target:?}", shortcut.display());
        None
    }
}

fn shortcut_script(shortcut: &Path) -> String {
    let quoted = shortcut.to_string_lossy().replace('\'', "''");
    format!("(New-Object -ComObject WScript.Shell).CreateShortcut('{quoted}').TargetPath")
}

/// Existing `<InstallLocation>\<exe_name>` paths from the uninstall registry keys.
pub(crate) async fn registry_candidates(exe_name: &str, timeout: Duration) -> Vec<PathBuf> {
    let mut candidates = vec![];
    for key in UNINSTALL_KEYS {
        let argv = ["reg", "query", *key, "/s", "/f", "Syncthing"].map(String::from);
        if let Some(stdout) = run_bounded(&argv, timeout).await {
            candidates.extend(
                parse_install_locations(&stdout, exe_name)
                    .into_iter()
                    .filter(|p| p.exists()),
            );
        }
    }
    candidates
}

fn parse_install_locations(output: &str, exe_name: &str) -> Vec<PathBuf> {
    INSTALL_LOCATION_RE
        .captures_iter(output)
        .map(|c| c[1].trim_matches('"').to_string())
        .filter(|location| !location.is_empty())
        .map(|location| PathBuf::from(location).join(exe_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_locations() {
        let output = r#"
HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Syncthing
    DisplayName    REG_SZ    Syncthing
    InstallLocation    REG_SZ    C:\Program Files\Syncthing
    DisplayVersion    REG_SZ    1.27.2

HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\SyncTrayzor
    InstallLocation    REG_EXPAND_SZ    "D:\Apps\SyncTrayzor"
    InstallLocation    REG_SZ

End of search: 2 match(es) found.
"#;
        let found = parse_install_locations(output, "syncthing.exe");
        assert_eq!(
            found,
            vec![
                PathBuf::from(r"C:\Program Files\Syncthing").join("syncthing.exe"),
                PathBuf::from(r"D:\Apps\SyncTrayzor").join("syncthing.exe"),
            ]
        );
    }

    #[test]
    fn test_parse_without_matches() {
        assert!(parse_install_locations("End of search: 0 match(es) found.", "x").is_empty());
    }

    #[test]
    fn test_shortcut_script_quotes_path() {
        let script = shortcut_script(Path::new(r"C:\Users\o'brien\Desktop\Syncthing.lnk"));
        assert!(script.contains(r"CreateShortcut('C:\Users\o''brien\Desktop\Syncthing.lnk')"));
        assert!(script.ends_with(".TargetPath"));
    }
}
