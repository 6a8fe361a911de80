//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::KanonConfig;
use crate::domain::errors::KanonError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into KanonConfig
/// 4. Applies environment variable overrides (KANON_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`KanonError::Configuration`] if the file cannot be read, a
/// referenced variable is unset, parsing fails, an override cannot be parsed,
/// or validation fails.
///
/// # Examples
///
/// ```no_run
/// use kanon::config::load_config;
///
/// # fn example() -> kanon::domain::Result<()> {
/// let config = load_config("kanon.toml")?;
/// println!("k = {}", config.deidentification.min_count);
/// # Ok(())
/// # }
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<KanonConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(KanonError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        KanonError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution, overrides and validation
pub fn parse_config(contents: &str) -> Result<KanonConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: KanonConfig = toml::from_str(&contents)
        .map_err(|e| KanonError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        KanonError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are copied untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| KanonError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(KanonError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Reads `name` and parses it; unset variables leave the value alone
fn env_override<T: FromStr>(name: &str, target: &mut T) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(name) {
        *target = raw.trim().parse().map_err(|e: T::Err| {
            KanonError::Configuration(format!("Invalid value '{raw}' for {name}: {e}"))
        })?;
    }
    Ok(())
}

/// Applies environment variable overrides using KANON_* prefix
///
/// Environment variables follow the pattern: KANON_<SECTION>_<KEY>
/// For example: KANON_DEIDENTIFICATION_MIN_COUNT, KANON_AUDIT_ENABLED
fn apply_env_overrides(config: &mut KanonConfig) -> Result<()> {
    // Application overrides
    env_override("KANON_APPLICATION_LOG_LEVEL", &mut config.application.log_level)?;
    env_override("KANON_APPLICATION_DRY_RUN", &mut config.application.dry_run)?;

    // De-identification overrides
    let deident = &mut config.deidentification;
    env_override("KANON_DEIDENTIFICATION_STRATEGY", &mut deident.strategy)?;
    env_override("KANON_DEIDENTIFICATION_MIN_COUNT", &mut deident.min_count)?;
    env_override(
        "KANON_DEIDENTIFICATION_RESERVOIR_CAPACITY",
        &mut deident.reservoir_capacity,
    )?;
    env_override("KANON_DEIDENTIFICATION_THREADS", &mut deident.threads)?;
    env_override("KANON_DEIDENTIFICATION_CHUNK_SIZE", &mut deident.chunk_size)?;
    env_override(
        "KANON_DEIDENTIFICATION_BLOCKING_PREFIX_LEN",
        &mut deident.blocking_prefix_len,
    )?;
    env_override("KANON_DEIDENTIFICATION_MIN_VALUE_LEN", &mut deident.min_value_len)?;

    // Audit overrides
    env_override("KANON_AUDIT_ENABLED", &mut config.audit.enabled)?;
    env_override("KANON_AUDIT_LOG_PATH", &mut config.audit.log_path)?;
    env_override("KANON_AUDIT_JSON_FORMAT", &mut config.audit.json_format)?;

    // Logging overrides
    env_override("KANON_LOGGING_LOCAL_ENABLED", &mut config.logging.local_enabled)?;
    env_override("KANON_LOGGING_LOCAL_PATH", &mut config.logging.local_path)?;
    env_override("KANON_LOGGING_LOCAL_ROTATION", &mut config.logging.local_rotation)?;

    Ok(())
}
