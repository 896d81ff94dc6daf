//! Tracing subscriber setup driven by [`LoggingConfig`].

use titanic_core::{LoggingConfig, Result, TitanicError};
use tracing_subscriber::EnvFilter;

/// Output formats accepted in `logging.format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(TitanicError::Config(format!(
                "unknown log format {other:?} (expected text or json)"
            ))),
        }
    }
}

/// Build the level filter. `RUST_LOG` wins over the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| TitanicError::Config(format!("invalid log level {:?}: {e}", config.level)))
}

/// Install the global subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let format = LogFormat::parse(&config.format)?;
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| TitanicError::Config(format!("failed to install subscriber: {e}")))
}
