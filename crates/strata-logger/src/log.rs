use std::env;
use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;

use crate::severity::LogSeverity;
use crate::systime::now;

/// Environment variable read by [`init_from_env`].
pub const LOG_ENV: &str = "STRATA_LOG";

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// Process-wide sink for the `log` facade. Lines look like
/// `[INFO] 2024-01-01 12:00:00 UTC strata_map::manager: scanned r.0.0.mca`.
#[derive(Debug)]
pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Logger { level }
    }

    pub fn format(severity: LogSeverity, time: &str, target: &str, msg: &str) -> String {
        format!("[{}] {} {}: {}", severity, time, target, msg)
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let severity = LogSeverity::of(record.level(), record.target());
        let line = Logger::format(
            severity,
            &now(),
            record.target(),
            &record.args().to_string(),
        );
        // stdout is reserved for command output.
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs the process logger at `level`. Fails if a logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = LOGGER.get_or_init(|| Logger::new(level));
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}

/// Like [`init`], reading the level from `STRATA_LOG` (default `info`).
pub fn init_from_env() -> Result<(), SetLoggerError> {
    init(level_from(env::var(LOG_ENV).ok().as_deref()))
}

fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(
            Logger::format(LogSeverity::Warning, "T", "strata_map", "slot skipped"),
            "[WARNING] T strata_map: slot skipped"
        );
    }

    #[test]
    fn test_level_from_env_value() {
        assert_eq!(level_from(None), LevelFilter::Info);
        assert_eq!(level_from(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from(Some(" WARN ")), LevelFilter::Warn);
        assert_eq!(level_from(Some("nonsense")), LevelFilter::Info);
    }

    #[test]
    fn test_enabled_respects_level() {
        let logger = Logger::new(LevelFilter::Warn);
        let info = Metadata::builder().level(log::Level::Info).build();
        let error = Metadata::builder().level(log::Level::Error).build();
        assert!(!logger.enabled(&info));
        assert!(logger.enabled(&error));
    }
}
