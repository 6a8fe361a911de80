//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "kanon.toml")]
    pub output: String,

    /// Include every setting with explanatory comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing kanon configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} and set min_count (k) for your corpus", self.output);
                println!("  2. Validate configuration: kanon validate-config");
                println!(
                    "  3. Run: kanon deidentify --input profile.json --candidates public.txt --output anon.json"
                );
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# kanon configuration

[application]
log_level = "info"

[deidentification]
strategy = "k_anon"
min_count = 30.0

[audit]
enabled = true
log_path = "./audit/deident.log"
"#
        .to_string()
    }

    /// Generate configuration with every setting documented
    fn generate_config_with_examples() -> String {
        r#"# kanon configuration
# Values may reference environment variables with ${VAR_NAME}.
# Any setting can be overridden with KANON_<SECTION>_<KEY>.

[application]
# trace | debug | info | warn | error
log_level = "info"
# Run the engine without writing the output profile
dry_run = false

[deidentification]
# k_anon: nearest public candidate, then a uniform sample of the pool
# digit_remap: re-roll the digits of rare values
strategy = "k_anon"
# Values observed fewer times than this are replaced (k)
min_count = 30.0
# Candidates kept per rare value while blocking
reservoir_capacity = 1000
# Worker threads (0 = one per core)
threads = 0
# Candidates per streamed task
chunk_size = 4096
# Characters in the blocking prefix
blocking_prefix_len = 2
# Values shorter than this are public and never replaced
min_value_len = 2

[audit]
enabled = true
log_path = "./audit/deident.log"
# JSON lines (true) or plain text (false)
json_format = true

[logging]
local_enabled = false
local_path = "./logs"
# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}
