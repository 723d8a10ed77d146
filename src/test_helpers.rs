use std::path::{Path, PathBuf};

/// Version banner printed by the fake executables.
pub const VERSION_BANNER: &str = "syncthing v1.27.12 \"Gold Grasshopper\" (go1.22.7 linux-amd64)";

/// Write an executable shell script at `dir/name` and return its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A fake `syncthing` that answers `--version` and otherwise idles until SIGTERM.
#[cfg(unix)]
pub fn fake_syncthing(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "syncthing",
        &format!(
            r#"if [ "$1" = "--version" ]; then echo '{VERSION_BANNER}'; exit 0; fi
trap 'exit 0' TERM
while true; do sleep 0.1; done"#
        ),
    )
}
