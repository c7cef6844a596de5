use std::process::ExitCode;

use service_host::{cli, config::Settings, logging};

fn main() -> ExitCode {
    let settings = match Settings::load_beside_executable() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let _guard = logging::init(&settings.logging, true);
    cli::exit_code(&cli::start(&settings))
}
