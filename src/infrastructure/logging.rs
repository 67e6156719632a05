use crate::domain::settings::{LogRotation, LogSettings};
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file writer alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// `RUST_LOG` wins over the configured level; an unparsable level falls
/// back to `info`
fn level_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed (a second session in the same
/// process, for example) instead of panicking.
pub fn init_logger(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    let console_layer = settings.console_logging_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_file(settings.show_file_line)
            .with_line_number(settings.show_file_line)
            .with_target(settings.show_target)
            .with_ansi(settings.ansi_colors)
    });

    let file_layer = if settings.file_logging_enabled {
        std::fs::create_dir_all(&settings.log_dir)?;
        let file_appender = RollingFileAppender::new(
            settings.rotation.into(),
            &settings.log_dir,
            &settings.file_name_prefix,
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_file(settings.show_file_line)
                .with_line_number(settings.show_file_line)
                .with_target(settings.show_target),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter(settings))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    tracing::info!(
        "Logging initialized (level {}, file logging {})",
        settings.level,
        if settings.file_logging_enabled { "on" } else { "off" }
    );

    Ok(LoggingGuard { _guards: guards })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(Rotation::from(LogRotation::Hourly), Rotation::HOURLY);
        assert_eq!(Rotation::from(LogRotation::Never), Rotation::NEVER);
        assert_eq!(Rotation::from(LogRotation::default()), Rotation::DAILY);
    }

    #[test]
    fn test_second_init_is_an_error() {
        let settings = LogSettings {
            console_logging_enabled: false,
            ..LogSettings::default()
        };
        // whichever call comes first in this process may win; the second must not panic
        let first = init_logger(&settings);
        let second = init_logger(&settings);
        assert!(first.is_err() || second.is_err());
    }
}
