//! CLI module for tuplebox
//!
//! Provides command-line interface for:
//! - check-config: Validate a storage configuration file
//! - inspect: Describe the tuple built from a JSON array
//! - extract-key: Extract a key from a JSON array

mod args;
mod commands;
mod errors;
mod io;

pub use args::{parse_key_parts, Cli, Command, KeyPartsArg};
pub use commands::{check_config, extract_key, inspect, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
