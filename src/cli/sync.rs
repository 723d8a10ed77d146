use crate::Result;

/// Asks the running syncthing to rescan all folders now
#[derive(Debug, clap::Args)]
#[clap(verbatim_doc_comment)]
pub struct Sync {}

impl Sync {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor()?;
        let result = match supervisor.attach().await {
            Ok(_) => supervisor.request_sync().await,
            Err(e) => Err(supervisor.advise(e)),
        };
        super::flush_notifications(&supervisor);
        match result {
            Err(e) if !e.is_advisory() => Err(e.into()),
            _ => Ok(()),
        }
    }
}
