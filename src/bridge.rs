//! Control loop between the service manager and the hosted application.
//!
//! Statuses only move forward: StartPending, Running, StopPending, Stopped.
//! The start hook is launched on a detached blocking task and never awaited,
//! so a slow start cannot delay the Running acknowledgement. The stop hook is
//! awaited inside the loop; nothing after a stop request needs handling.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::registry::{ControlRequest, ServiceStatus};

/// The two hooks the bridge drives. Errors inside them are the application's business.
pub trait HostedApplication: Send + Sync {
    fn start(&self);

    /// May block until the application has wound down.
    fn stop(&self);
}

pub type SharedApplication = Arc<dyn HostedApplication>;

/// Publishes status transitions to the supervisor.
pub trait StatusReporter {
    fn report(&mut self, status: ServiceStatus) -> Result<()>;
}

pub struct LifecycleBridge {
    app: SharedApplication,
}

impl LifecycleBridge {
    pub fn new(app: SharedApplication) -> Self {
        Self { app }
    }

    /// Runs one activation of the service to completion.
    ///
    /// Returns an error only when a status could not be reported.
    pub async fn run<R: StatusReporter>(
        self,
        requests: &mut UnboundedReceiver<ControlRequest>,
        reporter: &mut R,
    ) -> Result<()> {
        reporter.report(ServiceStatus::start_pending())?;

        let app = Arc::clone(&self.app);
        drop(tokio::task::spawn_blocking(move || app.start()));
        info!(action = "service_startup", "Hosted application launched");

        let current = ServiceStatus::running();
        reporter.report(current)?;

        let signal = loop {
            match requests.recv().await {
                Some(ControlRequest::Interrogate) => reporter.report(current)?,
                Some(signal) => break signal,
                None => {
                    warn!(action = "service_control", "Control channel closed, shutting down");
                    break ControlRequest::Shutdown;
                }
            }
        };

        info!(action = "service_shutdown", signal = signal.as_str(), "Stop requested");
        reporter.report(ServiceStatus::stop_pending())?;

        let app = Arc::clone(&self.app);
        if let Err(e) = tokio::task::spawn_blocking(move || app.stop()).await {
            error!(action = "service_shutdown", error = %e, "Stop hook did not complete");
        }

        reporter.report(ServiceStatus::stopped())?;
        info!(action = "service_stopped", "Service stopped");
        Ok(())
    }
}
