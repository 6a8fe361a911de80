//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for kanon using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// kanon - k-anonymity de-identification of field vocabularies
#[derive(Parser, Debug)]
#[command(name = "kanon")]
#[command(version, about, long_about = None)]
#[command(author = "Kanon Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "kanon.toml", env = "KANON_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "KANON_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// De-identify a field profile
    Deidentify(commands::deidentify::DeidentifyArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
