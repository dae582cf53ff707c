//! Logging system configuration and initialization
//!
//! - Console and/or file output, optional JSON formatting
//! - `RUST_LOG` overrides the configured level
//! - Previous log file is rotated with a timestamp suffix on start-up
//! - Local-time timestamps

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::Local;
use lazy_static::lazy_static;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::Directive,
    fmt::{self, MakeWriter, time::FormatTime},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the whole process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Timestamps in the machine's local time zone
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Rename an existing log file to `<stem>.<timestamp>.log`.
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<()> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path)
        .map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let stamp: chrono::DateTime<Local> = file_time.into();

    let file_stem = log_file_name.trim_end_matches(".log");
    let rotated_name = format!("{}.{}.log", file_stem, stamp.format("%Y%m%dT%H%M%S"));
    std::fs::rename(&log_file_path, log_dir.join(&rotated_name)).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            rotated_name,
            e
        )
    })?;

    Ok(())
}

/// Build the filter: `RUST_LOG` wins, otherwise the configured level plus
/// per-target caps for chatty dependencies (lifted at `trace`).
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.eq_ignore_ascii_case("trace") {
        for (target, level) in &config.module_filters {
            let directive: Directive = format!("{}={}", target, level)
                .parse()
                .map_err(|e| anyhow!("Invalid module filter '{}={}': {}", target, level, e))?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}

type FilteredRegistry = Layered<EnvFilter, Registry>;
type OutputLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Formatting layer for one output. `json` applies to console and file alike.
fn output_layer<W>(writer: W, json: bool, ansi: bool) -> OutputLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_timer(LocalTimeFormatter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .boxed()
    } else {
        fmt::Layer::new()
            .with_writer(writer)
            .with_timer(LocalTimeFormatter)
            .with_target(false)
            .with_ansi(ansi)
            .boxed()
    }
}

/// Rotate the previous log and open a non-blocking writer for this run.
fn open_log_file(config: &LoggingConfig) -> Result<NonBlocking> {
    std::fs::create_dir_all(&config.log_dir)
        .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", config.log_dir, e))?;
    rotate_existing_log_file(&config.log_dir, &config.file_name)?;

    let file_appender = rolling::never(&config.log_dir, &config.file_name);
    let (file_writer, file_guard) = non_blocking(file_appender);
    LOG_GUARDS
        .lock()
        .map_err(|_| anyhow!("Log guard registry poisoned"))?
        .push(file_guard);
    Ok(file_writer)
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.console_output && !config.file_output {
        return Err(anyhow!("No logging output configured"));
    }
    let env_filter = build_env_filter(config)?;

    let mut outputs: Vec<OutputLayer> = Vec::with_capacity(2);
    if config.console_output {
        outputs.push(output_layer(std::io::stdout, config.json_format, true));
    }
    if config.file_output {
        outputs.push(output_layer(open_log_file(config)?, config.json_format, false));
    }

    Registry::default()
        .with(env_filter)
        .with(outputs)
        .try_init()
        .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", config.log_dir.join(&config.file_name));
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Price Tracker System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("========================================");
}
