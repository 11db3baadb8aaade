use eyre::{Result, WrapErr, eyre};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging with JSON output
pub fn init_tracing() -> Result<()> {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(true)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;

    tracing::info!("Structured logging initialized");
    Ok(())
}

/// Initialize console-friendly logging for development
pub fn init_console_tracing() -> Result<()> {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;

    tracing::info!("Console logging initialized");
    Ok(())
}

/// Initialize tracing with an explicit filter directive and output format.
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn init_tracing_with_config(level: &str, json_format: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}"))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    let installed = if json_format {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.json().with_current_span(false).with_span_list(true))
            .try_init()
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init()
    };
    installed.map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;

    tracing::info!(level, json = json_format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        // Only meaningful when RUST_LOG does not override the level
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(init_tracing_with_config("microboot=loud", true).is_err());
        }
    }

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        let first = init_tracing_with_config("debug", true);
        let second = init_console_tracing();
        assert!(first.is_err() || second.is_err());
    }
}
