#![deny(missing_docs)]
//! Shared logging utilities for the harvester workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! a per-thread harvest round marker, and the logger initializers for the
//! binary and for tests.

use std::cell::Cell;
use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// File name used when logging to a directory.
pub const LOG_FILE_NAME: &str = "harvester.log";

thread_local! {
    /// Round the harvest governor is currently in, on this thread.
    static HARVEST_ROUND: Cell<u32> = const { Cell::new(0) };
}

/// Sets the harvest round for the current thread.
/// The governor calls this whenever a round starts.
pub fn set_harvest_round(round: u32) {
    HARVEST_ROUND.with(|v| v.set(round));
}

/// Retrieves the harvest round for the current thread.
/// Returns 0 before the first round.
pub fn harvest_round() -> u32 {
    HARVEST_ROUND.with(|v| v.get())
}

/// Logs a trace-level message tagged with the current harvest round.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!("[r{}] {}", $crate::harvest_round(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message tagged with the current harvest round.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!("[r{}] {}", $crate::harvest_round(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message tagged with the current harvest round.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!("[r{}] {}", $crate::harvest_round(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message tagged with the current harvest round.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!("[r{}] {}", $crate::harvest_round(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message tagged with the current harvest round.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!("[r{}] {}", $crate::harvest_round(), format_args!($($arg)*));
    }};
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Write to `harvester.log` in the log directory.
    File,
    /// Write to the terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

/// Initializes the global logger.
///
/// For `LogDestination::File` or `Both`, creates `harvester.log` inside
/// `log_dir`. A file that cannot be created downgrades to terminal-only
/// (or nothing, for `File`) with a note on stderr.
pub fn initialize(destination: LogDestination, level: LevelFilter, log_dir: &Path) {
    let config = build_config();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(destination, LogDestination::Terminal | LogDestination::Both) {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if matches!(destination, LogDestination::File | LogDestination::Both) {
        if let Some(file_logger) = create_file_logger(level, config, log_dir) {
            loggers.push(file_logger);
        }
    }
    if loggers.is_empty() {
        return;
    }

    // A logger may already be installed (e.g. by an embedding process).
    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    level: LevelFilter,
    config: Config,
    log_dir: &Path,
) -> Option<Box<WriteLogger<File>>> {
    let log_path = log_dir.join(LOG_FILE_NAME);
    if let Err(err) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Could not create log directory {:?}: {}", log_dir, err);
        return None;
    }
    match File::create(&log_path) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", log_path, err);
            None
        }
    }
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
