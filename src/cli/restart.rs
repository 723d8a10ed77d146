use crate::Result;
use crate::daemon::DaemonHandle;

/// Stops this workspace's syncthing, then starts it again in the foreground
#[derive(Debug, clap::Args)]
#[clap(verbatim_doc_comment)]
pub struct Restart {}

impl Restart {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor()?;
        supervisor.stop_detached().await;
        let result = supervisor.restart().await;
        super::flush_notifications(&supervisor);
        match result {
            Ok(DaemonHandle::Owned { .. }) => {
                supervisor.start_sync_timer();
                super::supervise(&supervisor).await
            }
            Ok(_) => Ok(()),
            Err(e) if e.is_advisory() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
