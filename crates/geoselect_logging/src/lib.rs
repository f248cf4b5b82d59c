//! Shared logging utilities for GeoSelect binaries.
//!
//! Every run writes one plain-text log file into a `GeoProcess_Logs`
//! folder that sits beside the output workspace. Lines look like
//! `2024-05-01 10:22:31,118 - INFO - Building Row Value Set`.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "geoselect=info";
const FILE_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const LINE_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Folder created next to the output workspace to hold run logs.
pub const LOG_FOLDER_NAME: &str = "GeoProcess_Logs";

/// Logging configuration shared by GeoSelect binaries.
pub struct LogConfig<'a> {
    /// Prefix of the log file name, e.g. `Selection`.
    pub run_name: &'a str,
    pub output_workspace: &'a Path,
    pub verbose: bool,
    /// A progress bar owns the terminal; only warnings reach stderr.
    pub progress_mode: bool,
}

/// An installed run log. Dropping it flushes and closes the log file.
#[must_use = "dropping the handle stops writing the log file"]
pub struct RunLog {
    pub path: PathBuf,
    _guard: WorkerGuard,
}

/// Initialize tracing with a per-run log file and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<RunLog> {
    let log_dir = ensure_logs_dir(config.output_workspace)?;
    let (log_path, appender) =
        create_log_appender(&log_dir, config.run_name, Local::now().naive_local());
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new("geoselect=debug,geoselect_logging=debug")
    } else if config.progress_mode {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(LineFormat)
                .with_writer(file_writer)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(RunLog {
        path: log_path,
        _guard: guard,
    })
}

/// Directory that receives the `GeoProcess_Logs` folder for a workspace.
///
/// This is the workspace's parent directory, or the grandparent when the
/// parent is itself a `.gdb` container.
pub fn log_root_for(output_workspace: &Path) -> PathBuf {
    let parent = match output_workspace.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return PathBuf::from("."),
    };

    let is_container = parent
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".gdb"));

    if is_container {
        match parent.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    } else {
        parent.to_path_buf()
    }
}

/// Get the logs directory for a workspace: `<root>/GeoProcess_Logs`
pub fn logs_dir(output_workspace: &Path) -> PathBuf {
    log_root_for(output_workspace).join(LOG_FOLDER_NAME)
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir(output_workspace: &Path) -> Result<PathBuf> {
    let logs = logs_dir(output_workspace);
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

/// `<Name>_Logs_<YYYY-MM-DD_HH-MM-SS>`
pub fn log_file_name(run_name: &str, started_at: NaiveDateTime) -> String {
    format!("{}_Logs_{}", run_name, started_at.format(FILE_STAMP_FORMAT))
}

/// Appender writing to `log_dir/<Name>_Logs_<stamp>`, never rotated.
pub fn create_log_appender(
    log_dir: &Path,
    run_name: &str,
    started_at: NaiveDateTime,
) -> (PathBuf, RollingFileAppender) {
    let file_name = log_file_name(run_name, started_at);
    let path = log_dir.join(&file_name);
    (path, rolling::never(log_dir, file_name))
}

/// Event formatter producing `timestamp - LEVEL - message` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format(LINE_STAMP_FORMAT),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
