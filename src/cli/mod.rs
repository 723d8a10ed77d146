use crate::Result;
use crate::settings::Settings;
use crate::supervisor::Supervisor;
use clap::Parser;
use log::LevelFilter;
use std::sync::Arc;

mod config;
mod detect;
mod open;
mod restart;
mod run;
mod start;
mod status;
mod stop;
mod sync;
mod verify;

/// Finds, starts and supervises a local syncthing daemon
#[derive(Debug, clap::Parser)]
#[clap(name = "syncwarden", version, verbatim_doc_comment)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    Config(config::Config),
    Detect(detect::Detect),
    Open(open::Open),
    Restart(restart::Restart),
    Run(run::Run),
    Start(start::Start),
    Status(status::Status),
    Stop(stop::Stop),
    Sync(sync::Sync),
    Verify(verify::Verify),
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Commands::Config(config) => config.run().await,
        Commands::Detect(detect) => detect.run().await,
        Commands::Open(open) => open.run().await,
        Commands::Restart(restart) => restart.run().await,
        Commands::Run(run) => run.run().await,
        Commands::Start(start) => start.run().await,
        Commands::Status(status) => status.run().await,
        Commands::Stop(stop) => stop.run().await,
        Commands::Sync(sync) => sync.run().await,
        Commands::Verify(verify) => verify.run().await,
    }
}

fn supervisor() -> Result<Arc<Supervisor>> {
    Ok(Supervisor::new(Settings::load()?))
}

/// Log everything the supervisor queued for the host.
fn flush_notifications(supervisor: &Supervisor) {
    for (level, msg) in supervisor.take_notifications() {
        match level {
            LevelFilter::Trace => trace!("{msg}"),
            LevelFilter::Debug => debug!("{msg}"),
            LevelFilter::Info => info!("{msg}"),
            LevelFilter::Warn => warn!("{msg}"),
            LevelFilter::Error => error!("{msg}"),
            _ => {}
        }
    }
}

/// Keep the host session alive until Ctrl-C or until an owned daemon exits,
/// relaying notifications, then shut the supervisor down.
async fn supervise(supervisor: &Arc<Supervisor>) -> Result<()> {
    let mut relay = tokio::time::interval(std::time::Duration::from_millis(250));
    let exited = supervisor.wait_for_exit();
    tokio::pin!(exited);
    let owned = supervisor.handle().pid().is_some();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, stopping");
                break;
            }
            _ = &mut exited, if owned => {
                break;
            }
            _ = relay.tick() => flush_notifications(supervisor),
        }
    }
    supervisor.shutdown().await;
    flush_notifications(supervisor);
    if let Some(reason) = supervisor.status().last_exit.and_then(|r| r.error_message()) {
        miette::bail!("syncthing exited abnormally ({reason})");
    }
    Ok(())
}
