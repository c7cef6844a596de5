use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use crate::bridge::SharedApplication;
use crate::config::Settings;
#[cfg(windows)]
use crate::coordinator::InstallCoordinator;
use crate::coordinator::ExecutableResolver;
use crate::error::{Result, ServiceError};

#[derive(Debug, Parser)]
#[command(name = "service-host", version, about = "Runs the hosted application as an OS service")]
pub struct Cli {
    /// `install` or `uninstall`; omit to run the service (or in the foreground when started by hand)
    #[arg(allow_hyphen_values = true)]
    pub action: Option<String>,

    /// Ignored; only the first argument selects the action.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub rest: Vec<String>,
}

impl Cli {
    pub fn action(&self) -> Action {
        Action::parse(self.action.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Install,
    Uninstall,
    Run,
    Unknown(String),
}

impl Action {
    pub fn parse(arg: Option<&str>) -> Self {
        match arg.map(str::to_lowercase).as_deref() {
            None => Action::Run,
            Some("install") => Action::Install,
            Some("uninstall") => Action::Uninstall,
            Some(other) => Action::Unknown(other.to_string()),
        }
    }

    /// Registration actions must not fall back to default settings, or they
    /// would act on a service other than the configured one.
    pub fn requires_settings(&self) -> bool {
        matches!(self, Action::Install | Action::Uninstall)
    }
}

pub fn exit_code(result: &Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

pub fn run(action: Action, settings: Settings, app: SharedApplication) -> ExitCode {
    info!(action = "cli", requested = ?action, "================== start ==================");

    match action {
        Action::Install => {
            let result = install(&settings, std::env::current_exe);
            if result.is_ok() {
                info!(action = "cli", "install success");
            }
            exit_code(&result)
        }
        Action::Uninstall => {
            let result = uninstall(&settings);
            if result.is_ok() {
                info!(action = "cli", "uninstall success");
            }
            exit_code(&result)
        }
        Action::Run => exit_code(&run_service_or_foreground(settings, app)),
        Action::Unknown(word) => {
            warn!(action = "cli", requested = %word, "Unknown action: {}", word);
            ExitCode::from(2)
        }
    }
}

#[cfg(windows)]
fn coordinator(settings: &Settings) -> InstallCoordinator<crate::windows_api::scm::ScmConnector> {
    InstallCoordinator::new(
        crate::windows_api::scm::ScmConnector,
        settings.service.clone(),
        settings.timings.clone(),
    )
}

#[cfg(not(windows))]
fn unsupported() -> Result<()> {
    error!(action = "cli", "Service registration is only available on Windows");
    Err(ServiceError::Unsupported)
}

pub fn install(settings: &Settings, executable: ExecutableResolver) -> Result<()> {
    #[cfg(windows)]
    return coordinator(settings)
        .with_executable_resolver(executable)
        .install();

    #[cfg(not(windows))]
    {
        let _ = (settings, executable);
        unsupported()
    }
}

pub fn uninstall(settings: &Settings) -> Result<()> {
    #[cfg(windows)]
    return coordinator(settings).uninstall();

    #[cfg(not(windows))]
    {
        let _ = settings;
        unsupported()
    }
}

pub fn start(settings: &Settings) -> Result<()> {
    #[cfg(windows)]
    return coordinator(settings).start();

    #[cfg(not(windows))]
    {
        let _ = settings;
        unsupported()
    }
}

fn run_service_or_foreground(settings: Settings, app: SharedApplication) -> Result<()> {
    #[cfg(windows)]
    {
        use crate::windows_api::dispatcher::{self, Dispatch};

        match dispatcher::dispatch(settings.clone(), app.clone())? {
            Dispatch::Completed => return Ok(()),
            Dispatch::NotUnderSupervisor => {
                info!(action = "cli", "Not started by the service manager, running in foreground");
            }
        }
    }
    run_foreground(settings, app)
}

/// Debug mode: run the start hook directly and stop on Ctrl-C.
pub fn run_foreground(settings: Settings, app: SharedApplication) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServiceError::Runtime)?;

    runtime.block_on(async {
        let starter = app.clone();
        drop(tokio::task::spawn_blocking(move || starter.start()));
        info!(action = "foreground", service = %settings.service.name, "Running in foreground, press Ctrl-C to stop");

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(action = "foreground", error = %e, "Unable to listen for Ctrl-C");
        }

        info!(action = "foreground", "Stopping");
        let stopper = app.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || stopper.stop()).await {
            error!(action = "foreground", error = %e, "Stop hook did not complete");
        }
    });

    runtime.shutdown_timeout(Duration::from_secs(1));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_words_are_case_insensitive() {
        assert_eq!(Action::parse(Some("install")), Action::Install);
        assert_eq!(Action::parse(Some("INSTALL")), Action::Install);
        assert_eq!(Action::parse(Some("UnInstall")), Action::Uninstall);
        assert_eq!(Action::parse(None), Action::Run);
    }

    #[test]
    fn test_unknown_action_is_kept() {
        assert_eq!(
            Action::parse(Some("Restart")),
            Action::Unknown("restart".to_string())
        );
    }

    #[test]
    fn test_cli_accepts_single_positional() {
        let cli = Cli::try_parse_from(["service-host", "Install"]).unwrap();
        assert_eq!(cli.action(), Action::Install);

        let cli = Cli::try_parse_from(["service-host"]).unwrap();
        assert_eq!(cli.action(), Action::Run);
    }

    #[test]
    fn test_only_first_argument_selects_action() {
        let cli = Cli::try_parse_from(["service-host", "install", "extra"]).unwrap();
        assert_eq!(cli.action(), Action::Install);

        let cli = Cli::try_parse_from(["service-host", "uninstall", "--force", "-q"]).unwrap();
        assert_eq!(cli.action(), Action::Uninstall);
    }

    #[test]
    fn test_flag_like_first_argument_is_unknown_action() {
        let cli = Cli::try_parse_from(["service-host", "-x"]).unwrap();
        assert_eq!(cli.action(), Action::Unknown("-x".to_string()));

        let cli = Cli::try_parse_from(["service-host", "--restart"]).unwrap();
        assert_eq!(cli.action(), Action::Unknown("--restart".to_string()));
    }

    #[test]
    fn test_registration_actions_require_settings() {
        assert!(Action::Install.requires_settings());
        assert!(Action::Uninstall.requires_settings());
        assert!(!Action::Run.requires_settings());
        assert!(!Action::Unknown("restart".to_string()).requires_settings());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_registry_unsupported_off_windows() {
        let settings = Settings::default();
        assert!(matches!(install(&settings, std::env::current_exe), Err(ServiceError::Unsupported)));
        assert!(matches!(uninstall(&settings), Err(ServiceError::Unsupported)));
    }

    #[test]
    fn test_unknown_action_exit_code() {
        let cli = Cli::try_parse_from(["service-host", "frobnicate"]).unwrap();
        let app: SharedApplication = std::sync::Arc::new(crate::app::Heartbeat::default());
        let code = run(cli.action(), Settings::default(), app);
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::from(2)));
    }
}
