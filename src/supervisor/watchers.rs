//! Background watcher tasks and REST-backed operations
//!
//! The sync timer asks a live daemon to rescan every `sync_interval`. It is
//! recreated whenever the interval changes and aborted on shutdown.

use super::{Supervisor, lock};
use crate::api::{DaemonApi, DaemonStatus};
use crate::error::SupervisorError;
use log::LevelFilter;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time;

impl Supervisor {
    fn api(&self) -> Result<DaemonApi, SupervisorError> {
        let port = self.handle().port().ok_or(SupervisorError::NotRunning)?;
        DaemonApi::new(port, &self.settings().api_key)
    }

    /// Ask the daemon to rescan all folders now.
    pub async fn request_sync(&self) -> Result<(), SupervisorError> {
        let api = self.api().map_err(|e| match e {
            SupervisorError::NotRunning => self.advise(e),
            e => e,
        })?;
        match api.scan().await {
            Ok(()) => {
                self.notify(LevelFilter::Info, "sync triggered");
                Ok(())
            }
            Err(e) => {
                self.notify(LevelFilter::Error, format!("failed to trigger sync: {e}"));
                Err(e)
            }
        }
    }

    /// Version, uptime and folders of the live daemon.
    pub async fn daemon_status(&self) -> Result<DaemonStatus, SupervisorError> {
        self.api()?.daemon_status().await
    }

    /// Whether the live daemon answers its unauthenticated health check.
    pub async fn is_healthy(&self) -> bool {
        match self.api() {
            Ok(api) => api.health().await,
            Err(_) => false,
        }
    }

    /// (Re)start the periodic sync timer from the current `sync_interval`.
    pub fn start_sync_timer(self: &Arc<Self>) {
        self.cancel_sync_timer();
        let Some(interval) = self.settings().sync_interval() else {
            debug!("periodic sync disabled");
            return;
        };
        debug!("syncing every {}", humantime::format_duration(interval));
        // the timer must not keep the supervisor alive
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(sync_loop(weak, interval));
        *lock(&self.sync_timer) = Some(task);
    }

    /// Change the interval and persist it. The timer is rebuilt only when the
    /// value actually changed.
    pub fn set_sync_interval(self: &Arc<Self>, interval: Duration) -> crate::Result<()> {
        let mut settings = self.settings();
        let value = humantime::format_duration(interval).to_string();
        let changed = settings.sync_interval() != Some(interval).filter(|i| !i.is_zero());
        settings.sync_interval = value.clone();
        settings.persist(|s| s.sync_interval = value)?;
        self.store_settings(settings);
        if changed {
            self.start_sync_timer();
        }
        Ok(())
    }

    pub fn sync_timer_active(&self) -> bool {
        lock(&self.sync_timer)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub(crate) fn cancel_sync_timer(&self) {
        if let Some(task) = lock(&self.sync_timer).take() {
            trace!("cancelling sync timer");
            task.abort();
        }
    }
}

async fn sync_loop(supervisor: Weak<Supervisor>, interval: Duration) {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(supervisor) = supervisor.upgrade() else {
            return;
        };
        if !supervisor.is_running() {
            trace!("sync timer: no daemon, skipping");
            continue;
        }
        if let Err(e) = supervisor.request_sync().await {
            debug!("periodic sync failed: {e}");
        }
    }
}
