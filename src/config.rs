use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ServiceError};

pub const SERVICE_NAME: &str = "ServiceHost";
pub const SERVICE_DISPLAY_NAME: &str = "Service Host";
pub const SERVICE_DESCRIPTION: &str = "Runs the hosted application as a background service";
pub const SETTINGS_FILE: &str = "service-host.json";
pub const LOG_FILE: &str = "service-host.log";
pub const SERVICE_EXE: &str = if cfg!(windows) {
    "service-host.exe"
} else {
    "service-host"
};

/// Static description of the service registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceDescriptor {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Launch at boot instead of on demand.
    pub auto_start: bool,
    /// Replace an existing registration of the same name on install.
    pub force_reinstall_on_duplicate: bool,
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
            display_name: SERVICE_DISPLAY_NAME.to_string(),
            description: SERVICE_DESCRIPTION.to_string(),
            auto_start: true,
            force_reinstall_on_duplicate: true,
        }
    }
}

/// Fixed pauses around asynchronous service manager operations, plus the
/// wait hints published while a transition is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub settle_delay_ms: u64,
    pub stop_grace_ms: u64,
    pub start_wait_hint_ms: u64,
    pub stop_wait_hint_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 3_000,
            stop_grace_ms: 1_000,
            start_wait_hint_ms: 10_000,
            stop_wait_hint_ms: 10_000,
        }
    }
}

impl Timings {
    /// All delays zeroed.
    pub fn immediate() -> Self {
        Self {
            settle_delay_ms: 0,
            stop_grace_ms: 0,
            start_wait_hint_ms: 0,
            stop_wait_hint_ms: 0,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn start_wait_hint(&self) -> Duration {
        Duration::from_millis(self.start_wait_hint_ms)
    }

    pub fn stop_wait_hint(&self) -> Duration {
        Duration::from_millis(self.stop_wait_hint_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Defaults to the executable's directory.
    pub directory: Option<PathBuf>,
    pub file_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl LogSettings {
    pub fn log_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .or_else(executable_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: LOG_FILE.to_string(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub service: ServiceDescriptor,
    pub timings: Timings,
    pub logging: LogSettings,
}

impl Settings {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(action = "settings_load", path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(ServiceError::SettingsIo)?;
        let settings: Settings = serde_json::from_str(&raw)?;
        info!(action = "settings_load", path = %path.display(), service = %settings.service.name, "Loaded settings");
        Ok(settings)
    }

    /// Loads `service-host.json` from the directory holding the running executable.
    pub fn load_beside_executable() -> Result<Self> {
        match executable_dir() {
            Some(dir) => Self::load(&dir.join(SETTINGS_FILE)),
            None => Ok(Self::default()),
        }
    }
}

pub fn executable_dir() -> Option<PathBuf> {
    let mut path = std::env::current_exe().ok()?;
    path.pop();
    Some(path)
}

/// The service binary shipped next to whichever helper is running.
pub fn service_binary_beside_current() -> std::io::Result<PathBuf> {
    Ok(std::env::current_exe()?.with_file_name(SERVICE_EXE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let descriptor = ServiceDescriptor::default();
        assert_eq!(descriptor.name, SERVICE_NAME);
        assert_eq!(descriptor.display_name, SERVICE_DISPLAY_NAME);
        assert!(descriptor.auto_start);
        assert!(descriptor.force_reinstall_on_duplicate);
    }

    #[test]
    fn test_timing_defaults() {
        let timings = Timings::default();
        assert_eq!(timings.settle_delay(), Duration::from_secs(3));
        assert_eq!(timings.stop_grace(), Duration::from_secs(1));
        assert_eq!(Timings::immediate().settle_delay(), Duration::ZERO);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"service": {"name": "Other"}, "timings": {"stop_grace_ms": 5}}"#)
                .unwrap();
        assert_eq!(settings.service.name, "Other");
        assert_eq!(settings.service.display_name, SERVICE_DISPLAY_NAME);
        assert_eq!(settings.timings.stop_grace(), Duration::from_millis(5));
        assert_eq!(settings.timings.settle_delay_ms, 3_000);
        assert_eq!(settings.logging.file_name, LOG_FILE);
    }

    #[test]
    fn test_explicit_log_directory_wins() {
        let mut settings = Settings::default();
        settings.logging.directory = Some(PathBuf::from("/var/log/host"));
        assert_eq!(settings.logging.log_directory(), PathBuf::from("/var/log/host"));
    }
}
