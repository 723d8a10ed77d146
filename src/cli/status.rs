use crate::Result;
use crate::error::SupervisorError;
use miette::IntoDiagnostic;

/// Display the status of the syncthing daemon
#[derive(Debug, clap::Args)]
#[clap(
    visible_alias = "stat",
    verbatim_doc_comment,
    long_about = "\
Display the status of the syncthing daemon

Looks for a running syncthing on the candidate ports and, when one is found,
asks it for its version, uptime and folders.

Example:
  syncwarden status
  syncwarden status --json

Output:
  State: adopted
  Port: 8384
  Health: ok
  Version: v1.27.12
  Uptime: 2h 3m 4s
  Folders: 2"
)]
pub struct Status {
    /// Print the status as JSON
    #[clap(long)]
    json: bool,
}

impl Status {
    pub async fn run(&self) -> Result<()> {
        let supervisor = super::supervisor()?;
        match supervisor.attach().await {
            Ok(_) | Err(SupervisorError::NotRunning) => {}
            Err(e) => return Err(e.into()),
        }
        let status = supervisor.status();
        let healthy = status.running && supervisor.is_healthy().await;
        let daemon = if status.running {
            match supervisor.daemon_status().await {
                Ok(daemon) => Some(daemon),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            }
        } else {
            None
        };

        if self.json {
            let json = serde_json::json!({ "status": status, "healthy": healthy, "daemon": daemon });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
            return Ok(());
        }
        println!("State: {}", status.state.style());
        if let Some(port) = status.port {
            println!("Port: {port}");
            println!("Health: {}", if healthy { "ok" } else { "unreachable" });
        }
        if let Some(daemon) = daemon {
            println!("Version: {}", daemon.version);
            println!("Uptime: {}", humantime::format_duration(daemon.uptime));
            println!("Folders: {}", daemon.folders.len());
            for folder in &daemon.folders {
                let name = if folder.label.is_empty() { &folder.id } else { &folder.label };
                println!("  {name}: {}", folder.path);
            }
        }
        Ok(())
    }
}
