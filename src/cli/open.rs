use crate::Result;
use crate::error::SupervisorError;
use crate::settings::Settings;
use duct::cmd;
use miette::IntoDiagnostic;

/// Opens the syncthing web UI in a browser
#[derive(Debug, clap::Args)]
#[clap(verbatim_doc_comment)]
pub struct Open {
    /// Only print the URL
    #[clap(long)]
    print: bool,
}

impl Open {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor()?;
        ensure_web_ui(&supervisor.settings())?;
        supervisor.attach().await?;
        let url = supervisor.gui_url().ok_or(SupervisorError::NotRunning)?;
        if self.print {
            println!("{url}");
            return Ok(());
        }
        info!("opening {url}");
        browser_command(&url)
            .stdout_null()
            .stderr_null()
            .start()
            .into_diagnostic()?;
        Ok(())
    }
}

fn ensure_web_ui(settings: &Settings) -> Result<()> {
    if !settings.web_ui_enabled {
        miette::bail!(
            help = "set `web_ui_enabled = true` in the settings file",
            "the web UI is disabled"
        );
    }
    Ok(())
}

fn browser_command(url: &str) -> duct::Expression {
    if cfg!(windows) {
        cmd!("cmd", "/C", "start", "", url)
    } else if cfg!(target_os = "macos") {
        cmd!("open", url)
    } else {
        cmd!("xdg-open", url)
    }
}
