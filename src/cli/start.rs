use crate::Result;
use crate::daemon::DaemonHandle;

/// Starts syncthing and supervises it in the foreground
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "s",
    verbatim_doc_comment,
    long_about = "\
Starts syncthing and supervises it in the foreground

If a syncthing is already listening on the configured port (or 8384, 8080,
22000) it is adopted and this command returns. Otherwise the executable is
located, a free port is picked and the daemon is spawned with its home in
<workspace>/.syncwarden. The daemon runs until interrupted.

Examples:
  syncwarden start
  syncwarden start --port 9090"
)]
pub struct Start {
    /// Preferred GUI/REST port for this run
    #[clap(short, long)]
    port: Option<u16>,
}

impl Start {
    pub async fn run(&self) -> Result<()> {
        let mut settings = crate::settings::Settings::load()?;
        if let Some(port) = self.port {
            settings.port = port;
        }
        let supervisor = crate::supervisor::Supervisor::new(settings);
        let result = supervisor.start().await;
        super::flush_notifications(&supervisor);
        match result {
            Ok(DaemonHandle::Owned { pid, port, .. }) => {
                println!("syncthing running with pid {pid} at http://127.0.0.1:{port}");
                supervisor.start_sync_timer();
                super::supervise(&supervisor).await
            }
            Ok(handle) => {
                println!("syncthing already running ({handle})");
                Ok(())
            }
            Err(e) if e.is_advisory() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
