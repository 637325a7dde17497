//! Logging bootstrap for DevEvent binaries.

use devevent_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, then the configured level.
pub fn env_filter(settings: &TelemetrySettings) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.log_level).map_err(|e| {
            anyhow::anyhow!("invalid log level '{}': {e}", settings.log_level)
        }),
    }
}

/// Install the global tracing subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter = env_filter(settings)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match settings.log_format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::info!(
            target: "devevent-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_level() {
        let settings = TelemetrySettings {
            log_level: "devevent=loud".to_string(),
            ..TelemetrySettings::default()
        };
        // RUST_LOG takes precedence when set in the test environment
        if std::env::var("RUST_LOG").is_err() {
            assert!(env_filter(&settings).is_err());
        }
    }

    #[test]
    fn init_twice_is_harmless() {
        let settings = TelemetrySettings::default();
        init(&settings).unwrap();
        init(&settings).unwrap();
    }
}
