use crate::Result;
use crate::discovery::DiscoveryResult;
use crate::error::SupervisorError;

/// Searches for a syncthing executable and remembers it
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Searches for a syncthing executable and remembers it

Checks common install locations, PATH, shortcuts and the registry (Windows),
then scans a few directories. Each candidate must answer `--version`. The
result is saved as `syncthing_path` in the settings file.

Example:
  syncwarden detect"
)]
pub struct Detect {
    /// Also list the locations that are checked
    #[clap(short, long)]
    verbose: bool,
}

impl Detect {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor()?;
        if self.verbose {
            let locations = crate::discovery::Locations::for_current_os();
            for path in locations.common.iter().chain(&locations.scan_roots) {
                println!("  {}", path.display());
            }
        }
        match supervisor.detect_executable().await {
            DiscoveryResult::Found { path, strategy } => {
                println!("{} ({strategy})", path.display());
                Ok(())
            }
            DiscoveryResult::NotFound => Err(SupervisorError::NotFound.into()),
        }
    }
}
