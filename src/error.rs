use thiserror::Error;

use crate::registry::ServiceState;

// Win32 codes the service manager hands back. Kept as plain integers so the
// classification also builds and tests on non-Windows hosts.
const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_DEPENDENT_SERVICES_RUNNING: i32 = 1051;
const ERROR_INVALID_SERVICE_CONTROL: i32 = 1052;
const ERROR_SERVICE_DOES_NOT_EXIST: i32 = 1060;
const ERROR_SERVICE_CANNOT_ACCEPT_CTRL: i32 = 1061;
const ERROR_SERVICE_NOT_ACTIVE: i32 = 1062;
const ERROR_DATABASE_DOES_NOT_EXIST: i32 = 1065;
const ERROR_SERVICE_MARKED_FOR_DELETE: i32 = 1072;
const ERROR_SERVICE_EXISTS: i32 = 1073;
const ERROR_DUPLICATE_SERVICE_NAME: i32 = 1078;
const ERROR_SHUTDOWN_IN_PROGRESS: i32 = 1115;
const RPC_S_SERVER_UNAVAILABLE: i32 = 1722;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service manager unavailable: {0}")]
    ManagerUnavailable(String),

    #[error("service `{0}` already exists")]
    AlreadyExists(String),

    #[error("service `{0}` is already installed")]
    AlreadyInstalled(String),

    #[error("service `{0}` not found")]
    NotFound(String),

    #[error("service `{0}` is not installed")]
    NotInstalled(String),

    #[error("permission denied while trying to {operation} `{name}`")]
    PermissionDenied { operation: &'static str, name: String },

    #[error("service `{name}` is not in a state that accepts {operation}")]
    InvalidState { operation: &'static str, name: String },

    #[error("service `{0}` is still in use")]
    InUse(String),

    #[error("cannot resolve own executable path: {0}")]
    PathResolution(#[source] std::io::Error),

    /// The channel to the supervisor broke; the control loop cannot continue.
    #[error("failed to report {state:?} to the service manager: {reason}")]
    StatusReport { state: ServiceState, reason: String },

    #[error("{operation} on `{name}` failed with os error {code}")]
    Os {
        operation: &'static str,
        name: String,
        code: i32,
    },

    #[error("invalid settings file: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("failed to read settings file: {0}")]
    SettingsIo(#[source] std::io::Error),

    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("service registry is not available on this platform")]
    Unsupported,
}

impl ServiceError {
    /// Maps a raw Win32 error code from a service manager call onto the error taxonomy.
    pub fn from_os_code(code: i32, operation: &'static str, name: &str) -> Self {
        let name = name.to_string();
        match code {
            ERROR_ACCESS_DENIED => ServiceError::PermissionDenied { operation, name },
            ERROR_SERVICE_EXISTS | ERROR_DUPLICATE_SERVICE_NAME => ServiceError::AlreadyExists(name),
            ERROR_SERVICE_DOES_NOT_EXIST => ServiceError::NotFound(name),
            ERROR_DEPENDENT_SERVICES_RUNNING | ERROR_SERVICE_MARKED_FOR_DELETE => {
                ServiceError::InUse(name)
            }
            ERROR_INVALID_SERVICE_CONTROL
            | ERROR_SERVICE_CANNOT_ACCEPT_CTRL
            | ERROR_SERVICE_NOT_ACTIVE => ServiceError::InvalidState { operation, name },
            ERROR_DATABASE_DOES_NOT_EXIST | ERROR_SHUTDOWN_IN_PROGRESS | RPC_S_SERVER_UNAVAILABLE => {
                ServiceError::ManagerUnavailable(format!("{operation} `{name}`: os error {code}"))
            }
            _ => ServiceError::Os {
                operation,
                name,
                code,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
