//! Install and uninstall procedures on top of a [`ServiceRegistry`].
//!
//! Neither procedure is atomic. A crash between the delete and the create of a
//! forced reinstall leaves no registration behind, and a crash after a stop
//! leaves a stopped one; both need a manual re-run.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::config::{ServiceDescriptor, Timings};
use crate::error::{Result, ServiceError};
use crate::registry::{
    ControlRequest, RegistryEntry, ServiceManagerConnect, ServiceRegistry, ServiceState,
};

/// Produces the path of the binary the service manager should launch.
pub type ExecutableResolver = fn() -> std::io::Result<PathBuf>;

pub struct InstallCoordinator<C> {
    connector: C,
    descriptor: ServiceDescriptor,
    timings: Timings,
    executable: ExecutableResolver,
}

impl<C: ServiceManagerConnect> InstallCoordinator<C> {
    pub fn new(connector: C, descriptor: ServiceDescriptor, timings: Timings) -> Self {
        Self {
            connector,
            descriptor,
            timings,
            executable: std::env::current_exe,
        }
    }

    pub fn with_executable_resolver(mut self, resolver: ExecutableResolver) -> Self {
        self.executable = resolver;
        self
    }

    /// Registers the running executable as a service.
    ///
    /// An existing registration of the same name is either reported as
    /// [`ServiceError::AlreadyInstalled`] or removed first, depending on
    /// `force_reinstall_on_duplicate`.
    pub fn install(&self) -> Result<()> {
        let result = self.try_install();
        if let Err(e) = &result {
            error!(action = "install", service = %self.descriptor.name, error = %e, "Install failed");
        }
        result
    }

    pub fn uninstall(&self) -> Result<()> {
        let result = self
            .connector
            .connect()
            .and_then(|registry| self.uninstall_with(&registry));
        if let Err(e) = &result {
            error!(action = "uninstall", service = %self.descriptor.name, error = %e, "Uninstall failed");
        }
        result
    }

    /// Asks the service manager to launch the installed service.
    pub fn start(&self) -> Result<()> {
        let result = self.connector.connect().and_then(|registry| {
            let handle = open_installed(&registry, &self.descriptor.name)?;
            registry.start(&handle)
        });
        match &result {
            Ok(()) => info!(action = "start", service = %self.descriptor.name, "Start requested"),
            Err(e) => error!(action = "start", service = %self.descriptor.name, error = %e, "Start failed"),
        }
        result
    }

    fn try_install(&self) -> Result<()> {
        let executable = (self.executable)()
            .and_then(std::path::absolute)
            .map_err(ServiceError::PathResolution)?;

        let registry = self.connector.connect()?;
        let names = registry.list_names()?;
        // Service names are case-insensitive to the service manager.
        if names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&self.descriptor.name))
        {
            if !self.descriptor.force_reinstall_on_duplicate {
                warn!(action = "install", service = %self.descriptor.name, "Service is already installed");
                return Err(ServiceError::AlreadyInstalled(self.descriptor.name.clone()));
            }
            info!(action = "install", service = %self.descriptor.name, "Removing existing registration before reinstall");
            match self.uninstall_with(&registry) {
                Ok(()) => {}
                // Listed but already gone, typically a deletion still in flight.
                Err(ServiceError::NotInstalled(_)) => {
                    info!(action = "install", service = %self.descriptor.name, "Existing registration vanished before removal");
                }
                Err(e) => return Err(e),
            }
            // Deletion completes asynchronously on the manager side.
            std::thread::sleep(self.timings.settle_delay());
        }

        let entry = RegistryEntry::new(&self.descriptor, &executable);
        registry.create(&entry)?;
        info!(
            action = "install",
            service = %entry.name,
            executable = %entry.executable_path.display(),
            start_type = ?entry.start_type,
            "Service installed"
        );
        Ok(())
    }

    fn uninstall_with<R: ServiceRegistry>(&self, registry: &R) -> Result<()> {
        let name = &self.descriptor.name;
        let handle = open_installed(registry, name)?;

        let status = registry.query(&handle)?;
        if status.state == ServiceState::Running {
            info!(action = "uninstall", service = %name, "Stopping running service");
            if let Err(e) = registry.control(&handle, ControlRequest::Stop) {
                warn!(action = "uninstall", service = %name, error = %e, "Stop failed, deleting anyway");
            }
            std::thread::sleep(self.timings.stop_grace());
        }

        registry.delete(handle)?;
        info!(action = "uninstall", service = %name, "Service uninstalled");
        Ok(())
    }
}

fn open_installed<R: ServiceRegistry>(registry: &R, name: &str) -> Result<R::Handle> {
    registry.open(name).map_err(|e| match e {
        ServiceError::NotFound(name) => ServiceError::NotInstalled(name),
        other => other,
    })
}
