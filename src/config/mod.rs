//! Configuration management for kanon.
//!
//! # Overview
//!
//! kanon uses a TOML configuration file (`kanon.toml`) with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `KANON_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kanon::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("kanon.toml")?;
//!
//! println!("Strategy: {}", config.deidentification.strategy);
//! println!("k: {}", config.deidentification.min_count);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level, dry run)
//! - [`DeidentificationConfig`] - Strategy and engine tuning
//! - [`AuditConfig`] - Replacement audit trail
//! - [`LoggingConfig`] - Local log files
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [deidentification]
//! strategy = "k_anon"
//! min_count = 30.0
//!
//! [audit]
//! enabled = true
//! log_path = "${KANON_AUDIT_DIR}/deident.log"
//! ```

pub mod loader;
pub mod schema;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, AuditConfig, DeidentificationConfig, KanonConfig, LoggingConfig, Strategy,
};
