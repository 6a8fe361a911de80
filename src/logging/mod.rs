//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Console output with span timings
//! - JSON-formatted local log files with rotation
//! - Configurable log levels (`RUST_LOG` overrides the configured level)
//!
//! # Example
//!
//! ```no_run
//! use kanon::logging::init_logging;
//! use kanon::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(field = "given_name", "Starting de-identification");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a de-identification run
///
/// # Example
///
/// ```no_run
/// use kanon::log_deident_start;
///
/// log_deident_start!("given_name", "k_anon", 1200);
/// ```
#[macro_export]
macro_rules! log_deident_start {
    ($field:expr, $strategy:expr, $values:expr) => {
        tracing::info!(
            field = %$field,
            strategy = %$strategy,
            values = $values,
            "Starting de-identification"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use kanon::log_error_with_context;
/// use kanon::domain::KanonError;
///
/// let error = KanonError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
