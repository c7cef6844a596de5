use std::ffi::OsString;
use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};
use windows::Win32::Foundation::ERROR_FAILED_SERVICE_CONTROLLER_CONNECT;
use windows_service::{
    define_windows_service,
    service::{ServiceControl, ServiceExitCode, ServiceState as OsServiceState, ServiceType},
    service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle},
    service_dispatcher,
};

use crate::bridge::{LifecycleBridge, SharedApplication, StatusReporter};
use crate::config::{Settings, Timings};
use crate::error::{Result, ServiceError};
use crate::registry::{ControlRequest, ServiceState, ServiceStatus};

/// Hand-off slot for `service_main`, which the dispatcher calls without arguments
/// we control. Written once, before the dispatcher starts.
static CONTEXT: OnceLock<(Settings, SharedApplication)> = OnceLock::new();

pub enum Dispatch {
    /// The service ran and has stopped.
    Completed,
    /// The process was started by hand rather than by the service manager.
    NotUnderSupervisor,
}

// Main service entry point
define_windows_service!(ffi_service_main, service_main);

/// Hands the process over to the service dispatcher. Blocks until the service stops.
pub fn dispatch(settings: Settings, app: SharedApplication) -> Result<Dispatch> {
    let name = settings.service.name.clone();
    let _ = CONTEXT.set((settings, app));

    match service_dispatcher::start(&name, ffi_service_main) {
        Ok(()) => Ok(Dispatch::Completed),
        Err(windows_service::Error::Winapi(e))
            if e.raw_os_error() == Some(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT.0 as i32) =>
        {
            Ok(Dispatch::NotUnderSupervisor)
        }
        Err(windows_service::Error::Winapi(e)) => match e.raw_os_error() {
            Some(code) => Err(ServiceError::from_os_code(code, "dispatch", &name)),
            None => Err(ServiceError::ManagerUnavailable(e.to_string())),
        },
        Err(other) => Err(ServiceError::ManagerUnavailable(other.to_string())),
    }
}

fn service_main(_arguments: Vec<OsString>) {
    let Some((settings, app)) = CONTEXT.get() else {
        error!(action = "service_main", "Service started without context");
        return;
    };
    if let Err(e) = run_service(settings, app.clone()) {
        error!(action = "service_main", error = %e, "Service failed");
    }
}

fn run_service(settings: &Settings, app: SharedApplication) -> Result<()> {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let status_handle = service_control_handler::register(
        &settings.service.name,
        move |control_event| {
            let request = match control_event {
                ServiceControl::Interrogate => ControlRequest::Interrogate,
                ServiceControl::Stop => ControlRequest::Stop,
                ServiceControl::Shutdown => ControlRequest::Shutdown,
                _ => return ServiceControlHandlerResult::NotImplemented,
            };
            // The loop may already have exited; nothing is left to notify then.
            let _ = request_tx.send(request);
            ServiceControlHandlerResult::NoError
        },
    )
    .map_err(|e| ServiceError::StatusReport {
        state: ServiceState::StartPending,
        reason: e.to_string(),
    })?;

    let mut reporter = ScmStatusReporter::new(status_handle, settings.timings.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServiceError::Runtime)?;
    let result = runtime.block_on(LifecycleBridge::new(app).run(&mut request_rx, &mut reporter));

    // A start hook that never returns must not keep the process alive.
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!(action = "service_main", ok = result.is_ok(), "Control loop finished");
    result
}

/// Publishes statuses through the handle returned by the control handler registration.
struct ScmStatusReporter {
    handle: ServiceStatusHandle,
    timings: Timings,
    checkpoint: u32,
}

impl ScmStatusReporter {
    fn new(handle: ServiceStatusHandle, timings: Timings) -> Self {
        Self {
            handle,
            timings,
            checkpoint: 0,
        }
    }
}

impl StatusReporter for ScmStatusReporter {
    fn report(&mut self, status: ServiceStatus) -> Result<()> {
        let (current_state, wait_hint) = match status.state {
            ServiceState::StartPending => (OsServiceState::StartPending, self.timings.start_wait_hint()),
            ServiceState::Running => (OsServiceState::Running, Duration::default()),
            ServiceState::StopPending => (OsServiceState::StopPending, self.timings.stop_wait_hint()),
            ServiceState::Stopped => (OsServiceState::Stopped, Duration::default()),
        };
        // Checkpoints only advance while a transition is pending.
        self.checkpoint = if wait_hint.is_zero() { 0 } else { self.checkpoint + 1 };

        self.handle
            .set_service_status(windows_service::service::ServiceStatus {
                service_type: ServiceType::OWN_PROCESS,
                current_state,
                controls_accepted: super::accepts_to_os(status.accepts),
                exit_code: ServiceExitCode::Win32(0),
                checkpoint: self.checkpoint,
                wait_hint,
                process_id: None,
            })
            .map_err(|e| ServiceError::StatusReport {
                state: status.state,
                reason: e.to_string(),
            })
    }
}
