use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogSettings;

/// Installs the global subscriber: JSON lines into the log file, plus a
/// readable console layer for interactive runs.
///
/// The returned guard flushes the file writer when dropped; keep it alive for
/// the life of the process. `None` means the log file could not be opened and
/// only the console layer (if any) is active.
pub fn init(settings: &LogSettings, console: bool) -> Option<WorkerGuard> {
    let directory = settings.log_directory();
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&settings.file_name)
        .build(&directory);

    let (file_layer, guard, open_error) = match appender {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_writer(non_blocking);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let console_layer = console.then(|| fmt::layer().with_target(false));

    // A subscriber may already be installed (tests, repeated helper calls).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if let Some(e) = open_error {
        warn!(action = "logging", directory = %directory.display(), error = %e, "Log file unavailable");
    }
    guard
}
