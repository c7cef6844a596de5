use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, warn};

use service_host::app::Heartbeat;
use service_host::bridge::SharedApplication;
use service_host::cli::{self, Cli};
use service_host::config::Settings;
use service_host::logging;

fn main() -> ExitCode {
    let action = Cli::parse().action();

    let loaded = Settings::load_beside_executable();
    let settings = loaded.as_ref().cloned().unwrap_or_default();

    // Under the service manager there is no console to write to.
    let _guard = logging::init(&settings.logging, std::io::stdout().is_terminal());
    if let Err(e) = loaded {
        if action.requires_settings() {
            error!(action = "settings_load", requested = ?action, error = %e, "Settings file is unusable");
            return ExitCode::FAILURE;
        }
        warn!(action = "settings_load", error = %e, "Falling back to default settings");
    }

    let app: SharedApplication = Arc::new(Heartbeat::new(
        std::time::Duration::from_secs(60),
        settings.timings.stop_wait_hint(),
    ));
    cli::run(action, settings, app)
}
