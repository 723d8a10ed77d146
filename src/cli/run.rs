use crate::Result;

/// Runs a foreground host session
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Runs a foreground host session

Starts syncthing when `auto_start` is set (or --start is passed), runs the
periodic sync timer and relays notifications until interrupted. On exit an
owned daemon is stopped; an adopted one is left running.

Examples:
  syncwarden run            Honor auto_start from the settings
  syncwarden run --start    Start syncthing regardless of auto_start"
)]
pub struct Run {
    /// Start syncthing even if auto_start is off
    #[clap(short, long)]
    start: bool,
}

impl Run {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor()?;
        if self.start || supervisor.settings().auto_start {
            // failures are queued as notifications; the session keeps running
            let _ = supervisor.start().await;
        }
        supervisor.start_sync_timer();
        super::flush_notifications(&supervisor);
        super::supervise(&supervisor).await
    }
}
