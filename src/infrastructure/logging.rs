use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_NAME: &str = "taskdesk.log";
const DEFAULT_FILTER: &str = "info,taskdesk=debug";

/// Installs the global subscriber: human output on stderr plus a plain log
/// file under `logs_dir`. Keep the returned guard alive for the life of the
/// process or buffered file lines are lost. Calling it twice is harmless.
pub fn init_logging(logs_dir: &Path) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER));
    let Ok(filter) = filter else {
        return None;
    };

    let file_appender = tracing_appender::rolling::never(logs_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(file_writer),
        )
        .try_init();

    installed.ok().map(|()| guard)
}
