use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, timeout};
use tracing::{error, info, warn};

use crate::bridge::HostedApplication;

/// Minimal hosted application: logs a heartbeat until told to stop.
pub struct Heartbeat {
    period: Duration,
    stop_timeout: Duration,
    shutdown_tx: watch::Sender<bool>,
    finished_tx: watch::Sender<bool>,
}

impl Heartbeat {
    pub fn new(period: Duration, stop_timeout: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (finished_tx, _) = watch::channel(false);
        Self {
            period,
            stop_timeout,
            shutdown_tx,
            finished_tx,
        }
    }

    async fn beat(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(self.period);
        let mut beats: u64 = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    beats += 1;
                    info!(action = "heartbeat", beats, "Hosted application alive");
                }
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
            }
        }
        info!(action = "heartbeat_stopped", beats, "Hosted application finished");
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(10))
    }
}

impl HostedApplication for Heartbeat {
    fn start(&self) {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(action = "heartbeat_start", error = %e, "Unable to build runtime");
                return;
            }
        };
        runtime.block_on(self.beat());
        self.finished_tx.send_replace(true);
    }

    fn stop(&self) {
        self.shutdown_tx.send_replace(true);

        let mut finished_rx = self.finished_tx.subscribe();
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(action = "heartbeat_stop", error = %e, "Unable to build runtime");
                return;
            }
        };
        let waited = runtime.block_on(timeout(self.stop_timeout, finished_rx.wait_for(|done| *done)));
        if waited.is_err() {
            warn!(action = "heartbeat_stop", "Hosted application did not finish in time");
        }
    }
}
