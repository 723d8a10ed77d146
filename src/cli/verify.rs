use crate::Result;
use crate::error::SupervisorError;
use crate::verify::ExecutableVerifier;
use std::path::PathBuf;

/// Checks that a file is a working syncthing executable
#[derive(Debug, clap::Args)]
#[clap(verbatim_doc_comment)]
pub struct Verify {
    /// Path to the executable
    path: PathBuf,
    /// Save it as the manual path on success
    #[clap(long)]
    save: bool,
}

impl Verify {
    pub async fn run(&self) -> Result<()> {
        if !ExecutableVerifier::new().verify(&self.path).await {
            return Err(SupervisorError::VerificationFailed {
                path: self.path.clone(),
            }
            .into());
        }
        println!("{} is a syncthing executable", self.path.display());
        if self.save {
            let manual_path = self.path.to_string_lossy().to_string();
            crate::settings::Settings::load()?.persist(|s| s.manual_path = manual_path)?;
            info!("saved manual_path to {}", crate::env::SYNCWARDEN_SETTINGS_FILE.display());
        }
        Ok(())
    }
}
