use crate::Result;
use crate::env;
use crate::settings::Settings;
use miette::IntoDiagnostic;

/// Shows the settings file and its effective values
#[derive(Debug, clap::Args)]
#[clap(visible_alias = "cfg", verbatim_doc_comment)]
pub struct Config {
    /// Only print the settings file path
    #[clap(long)]
    path: bool,
}

impl Config {
    pub async fn run(&self) -> Result<()> {
        if self.path {
            println!("{}", env::SYNCWARDEN_SETTINGS_FILE.display());
            return Ok(());
        }
        let settings = Settings::load()?;
        println!("# {}", env::SYNCWARDEN_SETTINGS_FILE.display());
        print!("{}", toml::to_string_pretty(&settings).into_diagnostic()?);
        println!("# home: {}", settings.home_dir().display());
        Ok(())
    }
}
