//! Service manager types and the registry seam.
//!
//! Everything above this module talks to the OS service manager through
//! [`ServiceManagerConnect`] and [`ServiceRegistry`]; the Windows implementation
//! lives in `windows_api::scm`.

use std::path::{Path, PathBuf};

use bitflags::bitflags;

use crate::config::ServiceDescriptor;
use crate::error::Result;

#[cfg(test)]
pub mod memory;

/// Lifecycle states, in the only order they are ever reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceState {
    StartPending,
    Running,
    StopPending,
    Stopped,
}

bitflags! {
    /// Control signals a running instance currently accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlAccept: u32 {
        const STOP = 0b001;
        const SHUTDOWN = 0b010;
        const INTERROGATE = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub state: ServiceState,
    pub accepts: ControlAccept,
}

impl ServiceStatus {
    pub fn start_pending() -> Self {
        Self {
            state: ServiceState::StartPending,
            accepts: ControlAccept::empty(),
        }
    }

    pub fn running() -> Self {
        Self {
            state: ServiceState::Running,
            accepts: ControlAccept::STOP | ControlAccept::SHUTDOWN | ControlAccept::INTERROGATE,
        }
    }

    pub fn stop_pending() -> Self {
        Self {
            state: ServiceState::StopPending,
            accepts: ControlAccept::empty(),
        }
    }

    pub fn stopped() -> Self {
        Self {
            state: ServiceState::Stopped,
            accepts: ControlAccept::empty(),
        }
    }
}

/// A control signal, either delivered by the service manager to the running
/// instance or sent to an installed service through [`ServiceRegistry::control`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Interrogate,
    Stop,
    Shutdown,
}

impl ControlRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlRequest::Interrogate => "interrogate",
            ControlRequest::Stop => "stop",
            ControlRequest::Shutdown => "shutdown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ControlRequest::Stop | ControlRequest::Shutdown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartType {
    Automatic,
    Manual,
}

impl StartType {
    pub fn from_auto_start(auto_start: bool) -> Self {
        if auto_start {
            StartType::Automatic
        } else {
            StartType::Manual
        }
    }
}

/// What the service manager persists for one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub executable_path: PathBuf,
    pub start_type: StartType,
}

impl RegistryEntry {
    pub fn new(descriptor: &ServiceDescriptor, executable_path: &Path) -> Self {
        Self {
            name: descriptor.name.clone(),
            display_name: descriptor.display_name.clone(),
            description: descriptor.description.clone(),
            executable_path: executable_path.to_path_buf(),
            start_type: StartType::from_auto_start(descriptor.auto_start),
        }
    }
}

/// One open connection to the service manager. Dropping it closes the connection.
pub trait ServiceRegistry {
    /// An open handle to a single registered service.
    type Handle;

    fn list_names(&self) -> Result<Vec<String>>;

    fn create(&self, entry: &RegistryEntry) -> Result<Self::Handle>;

    fn open(&self, name: &str) -> Result<Self::Handle>;

    fn query(&self, handle: &Self::Handle) -> Result<ServiceStatus>;

    fn control(&self, handle: &Self::Handle, signal: ControlRequest) -> Result<()>;

    fn delete(&self, handle: Self::Handle) -> Result<()>;

    fn start(&self, handle: &Self::Handle) -> Result<()>;
}

pub trait ServiceManagerConnect {
    type Registry: ServiceRegistry;

    fn connect(&self) -> Result<Self::Registry>;
}
