use crate::config::LogConfig;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set, the configured level otherwise.
fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global fmt subscriber. Later calls are no-ops.
pub fn init(config: &LogConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .try_init();
}
