use tracing_subscriber::EnvFilter;

use crate::config::LogFormatConfig;

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
///
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_logging(level: &str, format: LogFormatConfig) -> Result<(), anyhow::Error> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormatConfig::Json => builder.json().try_init(),
        LogFormatConfig::Pretty => builder.pretty().try_init(),
        LogFormatConfig::Compact => builder.compact().with_target(false).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}
