//! Configuration schema types
//!
//! This module defines the `kanon.toml` structure. Every section has defaults,
//! so an empty file is a valid configuration.

use crate::deident::KAnonSettings;
use serde::{Deserialize, Serialize};

/// De-identification strategy for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Nearest public candidate, then uniform fallback sample
    #[default]
    KAnon,
    /// Re-roll the digits of rare values
    DigitRemap,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::KAnon => write!(f, "k_anon"),
            Strategy::DigitRemap => write!(f, "digit_remap"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "k_anon" => Ok(Strategy::KAnon),
            "digit_remap" => Ok(Strategy::DigitRemap),
            other => Err(format!(
                "Invalid strategy '{other}'. Must be one of: k_anon, digit_remap"
            )),
        }
    }
}

/// Main kanon configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KanonConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// De-identification engine settings
    #[serde(default)]
    pub deidentification: DeidentificationConfig,

    /// Replacement audit trail
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KanonConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.deidentification.validate()?;
        self.audit.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (run the engine but don't write the output profile)
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// De-identification engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeidentificationConfig {
    /// Strategy applied to the field
    #[serde(default)]
    pub strategy: Strategy,

    /// Values observed fewer times than this are replaced (k)
    #[serde(default = "default_min_count")]
    pub min_count: f64,

    /// Candidates kept per victim while blocking
    #[serde(default = "default_reservoir_capacity")]
    pub reservoir_capacity: usize,

    /// Worker threads (0 = one per core)
    #[serde(default)]
    pub threads: usize,

    /// Candidates per streamed task
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters in the blocking prefix key
    #[serde(default = "default_blocking_prefix_len")]
    pub blocking_prefix_len: usize,

    /// Values shorter than this are public domain and never replaced
    #[serde(default = "default_min_value_len")]
    pub min_value_len: usize,
}

impl Default for DeidentificationConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            min_count: default_min_count(),
            reservoir_capacity: default_reservoir_capacity(),
            threads: 0,
            chunk_size: default_chunk_size(),
            blocking_prefix_len: default_blocking_prefix_len(),
            min_value_len: default_min_value_len(),
        }
    }
}

impl DeidentificationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.min_count.is_nan() || self.min_count <= 0.0 || self.min_count.is_infinite() {
            return Err(format!(
                "deidentification.min_count must be a positive number, got {}",
                self.min_count
            ));
        }

        if self.reservoir_capacity == 0 {
            return Err("deidentification.reservoir_capacity must be at least 1".to_string());
        }

        if self.chunk_size == 0 {
            return Err("deidentification.chunk_size must be at least 1".to_string());
        }

        if self.blocking_prefix_len == 0 {
            return Err("deidentification.blocking_prefix_len must be at least 1".to_string());
        }

        Ok(())
    }

    /// Engine settings for the k-anonymity strategy
    pub fn kanon_settings(&self) -> KAnonSettings {
        KAnonSettings {
            min_count: self.min_count,
            reservoir_capacity: self.reservoir_capacity,
            threads: self.threads,
            chunk_size: self.chunk_size,
        }
    }
}

/// Audit trail configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Record every replacement
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Audit file, appended to
    #[serde(default = "default_audit_log_path")]
    pub log_path: String,

    /// JSON lines (true) or plain text (false)
    #[serde(default = "default_true")]
    pub json_format: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_audit_log_path(),
            json_format: true,
        }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.log_path.trim().is_empty() {
            return Err("audit.log_path cannot be empty when audit is enabled".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_count() -> f64 {
    30.0
}

fn default_reservoir_capacity() -> usize {
    crate::deident::kanon::DEFAULT_RESERVOIR_CAPACITY
}

fn default_chunk_size() -> usize {
    crate::deident::kanon::DEFAULT_CHUNK_SIZE
}

fn default_blocking_prefix_len() -> usize {
    2
}

fn default_min_value_len() -> usize {
    2
}

fn default_audit_log_path() -> String {
    "./audit/deident.log".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
