use std::ffi::OsString;

use tracing::debug;
use windows_registry::LOCAL_MACHINE;
use windows_service::{
    service::{
        Service, ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType,
        ServiceState as OsServiceState, ServiceType,
    },
    service_manager::{ServiceManager, ServiceManagerAccess},
};

use crate::error::{Result, ServiceError};
use crate::registry::{
    ControlRequest, RegistryEntry, ServiceManagerConnect, ServiceRegistry, ServiceState,
    ServiceStatus, StartType,
};

/// Where the service manager persists one key per registered service.
const SERVICES_REG_PATH: &str = "SYSTEM\\CurrentControlSet\\Services";

fn map_error(error: windows_service::Error, operation: &'static str, name: &str) -> ServiceError {
    match error {
        windows_service::Error::Winapi(io) => match io.raw_os_error() {
            Some(code) => ServiceError::from_os_code(code, operation, name),
            None => ServiceError::ManagerUnavailable(io.to_string()),
        },
        other => ServiceError::ManagerUnavailable(format!("{operation} `{name}`: {other}")),
    }
}

/// Connects to the local Service Control Manager.
pub struct ScmConnector;

impl ServiceManagerConnect for ScmConnector {
    type Registry = ScmSession;

    fn connect(&self) -> Result<ScmSession> {
        let manager_access = ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE;
        let manager = ServiceManager::local_computer(None::<&str>, manager_access).map_err(|e| {
            match map_error(e, "connect", "service manager") {
                denied @ ServiceError::PermissionDenied { .. } => denied,
                other => ServiceError::ManagerUnavailable(other.to_string()),
            }
        })?;
        debug!(action = "scm_connect", "Connected to service manager");
        Ok(ScmSession { manager })
    }
}

/// The manager handle is closed when the session drops.
pub struct ScmSession {
    manager: ServiceManager,
}

pub struct ScmHandle {
    name: String,
    service: Service,
}

impl ServiceRegistry for ScmSession {
    type Handle = ScmHandle;

    fn list_names(&self) -> Result<Vec<String>> {
        let services = LOCAL_MACHINE
            .open(SERVICES_REG_PATH)
            .map_err(|e| ServiceError::ManagerUnavailable(e.message()))?;
        let names = services
            .keys()
            .map_err(|e| ServiceError::ManagerUnavailable(e.message()))?
            .collect();
        Ok(names)
    }

    fn create(&self, entry: &RegistryEntry) -> Result<ScmHandle> {
        let service_info = ServiceInfo {
            name: OsString::from(&entry.name),
            display_name: OsString::from(&entry.display_name),
            service_type: ServiceType::OWN_PROCESS,
            start_type: match entry.start_type {
                StartType::Automatic => ServiceStartType::AutoStart,
                StartType::Manual => ServiceStartType::OnDemand,
            },
            error_control: ServiceErrorControl::Normal,
            executable_path: entry.executable_path.clone(),
            launch_arguments: vec![],
            dependencies: vec![],
            account_name: None, // run as System
            account_password: None,
        };
        let access = ServiceAccess::CHANGE_CONFIG
            | ServiceAccess::QUERY_STATUS
            | ServiceAccess::START
            | ServiceAccess::STOP
            | ServiceAccess::DELETE;
        let service = self
            .manager
            .create_service(&service_info, access)
            .map_err(|e| map_error(e, "create", &entry.name))?;
        service
            .set_description(&entry.description)
            .map_err(|e| map_error(e, "describe", &entry.name))?;
        Ok(ScmHandle {
            name: entry.name.clone(),
            service,
        })
    }

    fn open(&self, name: &str) -> Result<ScmHandle> {
        let access = ServiceAccess::QUERY_STATUS
            | ServiceAccess::START
            | ServiceAccess::STOP
            | ServiceAccess::DELETE;
        let service = self
            .manager
            .open_service(name, access)
            .map_err(|e| map_error(e, "open", name))?;
        Ok(ScmHandle {
            name: name.to_string(),
            service,
        })
    }

    fn query(&self, handle: &ScmHandle) -> Result<ServiceStatus> {
        let status = handle
            .service
            .query_status()
            .map_err(|e| map_error(e, "query", &handle.name))?;
        // Paused instances are still alive and must be stopped before deletion.
        let state = match status.current_state {
            OsServiceState::StartPending | OsServiceState::ContinuePending => ServiceState::StartPending,
            OsServiceState::Running | OsServiceState::Paused | OsServiceState::PausePending => {
                ServiceState::Running
            }
            OsServiceState::StopPending => ServiceState::StopPending,
            OsServiceState::Stopped => ServiceState::Stopped,
        };
        Ok(ServiceStatus {
            state,
            accepts: super::accepts_from_os(status.controls_accepted),
        })
    }

    fn control(&self, handle: &ScmHandle, signal: ControlRequest) -> Result<()> {
        match signal {
            ControlRequest::Stop => handle
                .service
                .stop()
                .map(|_| ())
                .map_err(|e| map_error(e, "stop", &handle.name)),
            ControlRequest::Interrogate => self.query(handle).map(|_| ()),
            // Only the service manager itself may send Shutdown.
            ControlRequest::Shutdown => Err(ServiceError::InvalidState {
                operation: "shutdown",
                name: handle.name.clone(),
            }),
        }
    }

    fn delete(&self, handle: ScmHandle) -> Result<()> {
        handle
            .service
            .delete()
            .map_err(|e| map_error(e, "delete", &handle.name))
    }

    fn start(&self, handle: &ScmHandle) -> Result<()> {
        handle
            .service
            .start::<&str>(&[])
            .map_err(|e| map_error(e, "start", &handle.name))
    }
}
