//! CLI argument definitions using clap
//!
//! Commands:
//! - tuplebox check-config --config <path>
//! - tuplebox inspect [record] [--parts <parts>]
//! - tuplebox extract-key [record] --parts <parts>
//!
//! Records are JSON arrays. When omitted they are read from stdin.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::format::FieldType;

/// tuplebox - tuple storage and memory quota toolbox
#[derive(Parser, Debug)]
#[command(name = "tuplebox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load and validate a storage configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./tuplebox.json")]
        config: PathBuf,
    },

    /// Build a tuple from a JSON array and describe it
    Inspect {
        /// Record as a JSON array
        record: Option<String>,

        /// Key parts the tuple format is built from, e.g. "0:unsigned,2:string"
        #[arg(long, value_parser = parse_key_parts)]
        parts: Option<KeyPartsArg>,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Extract a key from a JSON array
    ExtractKey {
        /// Record as a JSON array
        record: Option<String>,

        /// Key parts in key order, e.g. "2,0" or "1:string,0:unsigned"
        #[arg(long, value_parser = parse_key_parts)]
        parts: KeyPartsArg,
    },
}

/// Parsed `--parts` value: field numbers with optional types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPartsArg(pub Vec<(u32, FieldType)>);

/// Parse "fieldno[:type],..." into key parts. Missing types mean `any`.
pub fn parse_key_parts(s: &str) -> Result<KeyPartsArg, String> {
    let mut parts = Vec::new();
    for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let (fieldno, field_type) = match item.split_once(':') {
            Some((fieldno, name)) => (fieldno, parse_field_type(name)?),
            None => (item, FieldType::Any),
        };
        let fieldno = fieldno
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid field number '{}'", fieldno))?;
        parts.push((fieldno, field_type));
    }
    if parts.is_empty() {
        return Err("at least one key part is required".to_string());
    }
    Ok(KeyPartsArg(parts))
}

fn parse_field_type(name: &str) -> Result<FieldType, String> {
    serde_json::from_value(serde_json::Value::String(name.trim().to_lowercase()))
        .map_err(|_| format!("unknown field type '{}'", name))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_fieldnos() {
        let parts = parse_key_parts("2,0").unwrap();
        assert_eq!(parts.0, vec![(2, FieldType::Any), (0, FieldType::Any)]);
    }

    #[test]
    fn test_parse_typed_parts() {
        let parts = parse_key_parts("1:String, 0:unsigned").unwrap();
        assert_eq!(
            parts.0,
            vec![(1, FieldType::String), (0, FieldType::Unsigned)]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_key_parts("").is_err());
        assert!(parse_key_parts("x").is_err());
        assert!(parse_key_parts("0:blob").is_err());
    }

    #[test]
    fn test_cli_parses_extract_key() {
        let cli = Cli::try_parse_from(["tuplebox", "extract-key", "[1,2]", "--parts", "1"]).unwrap();
        match cli.command {
            Command::ExtractKey { record, parts } => {
                assert_eq!(record.as_deref(), Some("[1,2]"));
                assert_eq!(parts.0, vec![(1, FieldType::Any)]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
