use crate::constants::{LOG_DIR, LOG_FILE_PREFIX};
use crate::error::{IngestError, Result};
use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "movie_ingest=info,warn";

/// Console plus daily-rotated JSON file logging under `logs/`.
pub fn init_logging() -> Result<()> {
    init_logging_in(Path::new(LOG_DIR))
}

/// Install the global subscriber writing JSON lines into `log_dir`.
/// `RUST_LOG` overrides the default filter.
pub fn init_logging_in(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_target(true).with_writer(std::io::stdout))
        .try_init()
        .map_err(|e| IngestError::Config(format!("logging already initialised: {e}")))?;

    // The writer flushes on drop; keep it for the life of the process
    std::mem::forget(guard);
    Ok(())
}
