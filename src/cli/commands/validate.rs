//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the kanon configuration file.

use crate::config::{load_config, Strategy};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let deident = &config.deidentification;
        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Strategy: {}", deident.strategy);
        println!("  Minimum Count (k): {}", deident.min_count);
        if deident.strategy == Strategy::KAnon {
            println!("  Reservoir Capacity: {}", deident.reservoir_capacity);
            println!("  Chunk Size: {}", deident.chunk_size);
            println!("  Blocking Prefix: {} chars", deident.blocking_prefix_len);
            println!("  Public Below: {} chars", deident.min_value_len);
        }
        println!(
            "  Threads: {}",
            if deident.threads == 0 {
                "auto".to_string()
            } else {
                deident.threads.to_string()
            }
        );
        if config.audit.enabled {
            println!("  Audit Log: {}", config.audit.log_path);
        } else {
            println!("  Audit Log: disabled");
        }
        if config.logging.local_enabled {
            println!(
                "  Log Files: {} ({})",
                config.logging.local_path, config.logging.local_rotation
            );
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_valid_config_exits_zero() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[deidentification]\nmin_count = 5.0").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_invalid_config_exits_two() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[deidentification]\nmin_count = -1.0").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
