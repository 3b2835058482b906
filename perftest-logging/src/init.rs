use anyhow::Result;
use perftest_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Filter from an explicit level, then `RUST_LOG`, then `info`
pub fn build_env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = build_env_filter(log_level);

    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize logging from configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config.level.as_str());
    let location = config.include_location;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(location)
        .with_line_number(location);

    let initialized = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };

    if initialized.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    tracing::debug!(format = ?config.format, level = %config.level, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use perftest_config::LogLevel;

    #[test]
    fn test_invalid_level_falls_back() {
        let filter = build_env_filter("not[a(filter");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn test_explicit_level_is_used() {
        assert_eq!(build_env_filter("debug").to_string(), "debug");
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            include_location: true,
        };
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
        assert!(init_simple_tracing("info").is_ok());
    }
}
