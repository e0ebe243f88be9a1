#![deny(missing_docs)]
//! Shared logging utilities for the wordcount workspace.
//!
//! This crate provides the `wc_*` logging macros used across the codebase,
//! level parsing for the service configuration and a minimal test
//! initializer for the global logger.

use log::LevelFilter;

#[doc(hidden)]
pub use log;

/// Log target used by every `wc_*` macro.
pub const TARGET: &str = "wordcount";

/// Logs a trace-level message under the [`TARGET`] target.
#[macro_export]
macro_rules! wc_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message under the [`TARGET`] target.
#[macro_export]
macro_rules! wc_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an info-level message under the [`TARGET`] target.
#[macro_export]
macro_rules! wc_info {
    ($($arg:tt)*) => {{
        $crate::log::info!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message under the [`TARGET`] target.
#[macro_export]
macro_rules! wc_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an error-level message under the [`TARGET`] target.
#[macro_export]
macro_rules! wc_error {
    ($($arg:tt)*) => {{
        $crate::log::error!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Parses a level name such as `info` or `DEBUG` into a filter.
///
/// Returns `None` for unknown names.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

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
