//! Tracing setup: console plus rotated `pipeline` and `errors` log files.

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use pubcompare_shared::LoggingConfig;

use crate::commands::LogFormat;

/// Keeps the file writers alive. Dropping or closing it flushes buffered lines.
#[must_use = "dropping the guard stops file logging"]
pub(crate) struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

impl LogGuard {
    /// Flush and stop the file writers.
    pub(crate) fn close(self) {
        drop(self);
    }
}

/// Console filter for a `-v` count. `RUST_LOG` takes precedence.
pub(crate) fn console_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,pubcompare=info",
        1 => "warn,pubcompare=debug",
        _ => "pubcompare=trace,info",
    }
}

fn daily_appender(dir: &Path, prefix: &str, keep: usize) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(keep.max(1))
        .build(dir)
        .wrap_err_with(|| format!("failed to open {prefix} log in {}", dir.display()))
}

/// Install the global subscriber.
///
/// - console: INFO and up (text or JSON), adjustable with `-v` or `RUST_LOG`
/// - `<logs_dir>/pipeline.<date>.log`: DEBUG and up, JSON
/// - `<logs_dir>/errors.<date>.log`: ERROR only, JSON
pub(crate) fn init(config: &LoggingConfig, verbose: u8, format: &LogFormat) -> Result<LogGuard> {
    let dir = Path::new(&config.logs_dir);
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("failed to create logs directory {}", dir.display()))?;

    let (pipeline_writer, pipeline_guard) =
        tracing_appender::non_blocking(daily_appender(dir, "pipeline", config.pipeline_retention)?);
    let (error_writer, error_guard) =
        tracing_appender::non_blocking(daily_appender(dir, "errors", config.error_retention)?);

    let console_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console_directive(verbose)))
    };
    let (console_text, console_json) = match format {
        LogFormat::Text => (
            Some(fmt::layer().with_target(false).with_filter(console_filter())),
            None,
        ),
        LogFormat::Json => (None, Some(fmt::layer().json().with_filter(console_filter()))),
    };

    let pipeline_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(pipeline_writer)
        .with_filter(LevelFilter::DEBUG);
    let error_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(error_writer)
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(console_text)
        .with(console_json)
        .with(pipeline_layer)
        .with(error_layer)
        .try_init()
        .wrap_err("failed to install tracing subscriber")?;

    Ok(LogGuard {
        _guards: vec![pipeline_guard, error_guard],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_console_level() {
        assert!(console_directive(0).contains("pubcompare=info"));
        assert!(console_directive(1).contains("pubcompare=debug"));
        assert!(console_directive(5).contains("pubcompare=trace"));
    }

    #[test]
    fn appender_creates_dated_files() {
        let dir = std::env::temp_dir().join(format!("pubcompare-logs-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut appender = daily_appender(&dir, "pipeline", 3).unwrap();
        std::io::Write::write_all(&mut appender, b"{\"msg\":\"hello\"}\n").unwrap();
        std::io::Write::flush(&mut appender).unwrap();

        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("pipeline."));
        assert!(names[0].ends_with(".log"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
