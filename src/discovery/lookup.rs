use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::time;

/// Run `argv` and return its stdout if it exits 0 within `timeout`.
/// Spawn failures, non-zero exits and timeouts all yield `None`.
pub(crate) async fn run_bounded(argv: &[String], timeout: Duration) -> Option<String> {
    let (program, args) = argv.split_first()?;
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            trace!("lookup: {program} unavailable: {e}");
            return None;
        }
    };
    match time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(Ok(output)) => {
            trace!("lookup: {program} exited with {}", output.status);
            None
        }
        Ok(Err(e)) => {
            debug!("lookup: {program} failed: {e}");
            None
        }
        Err(_) => {
            debug!("lookup: {program} timed out after {timeout:?}");
            None
        }
    }
}

/// First non-empty output line of `argv`, as a path.
pub(crate) async fn first_path(argv: &[String], timeout: Duration) -> Option<PathBuf> {
    let stdout = run_bounded(argv, timeout).await?;
    first_line(&stdout).map(PathBuf::from)
}

fn first_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| !line.is_empty())
}
