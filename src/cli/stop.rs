use crate::Result;

/// Stops a syncthing started by syncwarden for this workspace
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "kill",
    verbatim_doc_comment,
    long_about = "\
Stops a syncthing started by syncwarden for this workspace

Sends SIGTERM to the daemon running with this workspace's home directory.
A syncthing started some other way is never touched.

Example:
  syncwarden stop"
)]
pub struct Stop {}

impl Stop {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor()?;
        match supervisor.stop_detached().await {
            0 => info!("{}", crate::error::SupervisorError::NotRunning),
            n => info!("stopped {n} syncthing process(es)"),
        }
        Ok(())
    }
}
