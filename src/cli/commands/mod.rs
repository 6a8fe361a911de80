//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod deidentify;
pub mod init;
pub mod validate;
