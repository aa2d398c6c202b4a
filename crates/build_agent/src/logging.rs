use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "BUILDER_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs the global fmt subscriber writing to stderr.
///
/// The filter comes from `BUILDER_LOG` (`EnvFilter` syntax) and falls back to
/// `info` when unset or invalid. Calling this twice is an error.
pub fn init_logging() -> Result<(), String> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| format!("failed to install log subscriber: {error}"))
}
