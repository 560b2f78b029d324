//! Logging setup and helpers for the proxy server

use crate::models::RequestSummary;
use anyhow::Result;
use chrono::Utc;
use log::{debug, error, info, trace, warn, LevelFilter};
use std::sync::Once;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Initialize logging from the RUST_LOG environment variable.
/// This should be called once at the start of the application.
pub fn init_logger_with_env() {
    INIT.call_once(|| {
        let level = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string())
            .parse::<LevelFilter>()
            .unwrap_or(LevelFilter::Info);

        log::set_max_level(level);

        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_target(false)
            .with_level(true)
            .with_ansi(true)
            .init();

        // Initialize LogTracer to bridge log events to tracing (after subscriber is set up)
        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }
    });
}

/// Initialize logging with an explicit level string from the configuration.
/// Falls back to `info` on an unrecognized level.
pub fn init_logger_with_config(log_level: &str) {
    INIT.call_once(|| {
        let level = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
        log::set_max_level(level);

        FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(log_level.to_string()))
            .with_target(false)
            .with_level(true)
            .with_ansi(true)
            .init();

        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }
    });
}

/// Log a received request as a timestamped JSON summary (debug level)
pub fn log_request_summary(summary: &RequestSummary) -> Result<()> {
    let timestamp = Utc::now().to_rfc3339();
    let rendered = serde_json::to_string_pretty(summary)?;
    debug!("[{}] REQUEST:\n{}", timestamp, rendered);
    Ok(())
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a warning message
pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

/// Log a trace message
pub fn log_trace(message: &str) {
    trace!("{}", message);
}

/// Convenience macro for logging request summaries
#[macro_export]
macro_rules! log_request {
    ($summary:expr) => {
        if let Err(e) = $crate::logging::log_request_summary($summary) {
            eprintln!("Failed to log request summary: {}", e);
        }
    };
}

/// Convenience macro for logging errors
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*))
    };
}

/// Convenience macro for logging info messages
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*))
    };
}

/// Convenience macro for logging warning messages
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::logging::log_warning(&format!($($arg)*))
    };
}

/// Convenience macro for logging debug messages
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug(&format!($($arg)*));
    };
}

/// Convenience macro for logging trace messages
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::logging::log_trace(&format!($($arg)*));
    };
}
