//! CLI command implementations
//!
//! Each command builds a private storage context, does its work and
//! prints one JSON response. Log lines share stdout, so the logger never
//! drops below WARN here; a config file may only raise the floor.

use std::io::{self, Write};
use std::path::Path;

use serde_json::{json, Value};

use crate::codec::{format_record, type_of};
use crate::config::StorageConfig;
use crate::context::StorageContext;
use crate::format::{FormatDef, KeyDef};
use crate::observability::{Logger, Severity};
use crate::tuple::Tuple;

use super::args::{Command, KeyPartsArg};
use super::errors::CliResult;
use super::io::{json_to_record, read_record_json, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command, &mut io::stdout())
}

/// Run the appropriate command based on CLI args, writing the response to `out`
pub fn run_command<W: Write>(cmd: Command, out: &mut W) -> CliResult<()> {
    Logger::set_min_severity(Severity::Warn);
    let data = match cmd {
        Command::CheckConfig { config } => check_config(&config)?,
        Command::Inspect {
            record,
            parts,
            config,
        } => {
            let config = match config {
                Some(path) => {
                    let config = StorageConfig::load(&path)?;
                    Logger::set_min_severity(config.log_severity()?.max(Severity::Warn));
                    config
                }
                None => StorageConfig::default(),
            };
            inspect(&config, &read_record_json(record)?, parts.as_ref())?
        }
        Command::ExtractKey { record, parts } => {
            extract_key(&StorageConfig::default(), &read_record_json(record)?, &parts)?
        }
    };
    write_response(out, data)
}

/// Load a configuration file and report the effective settings
pub fn check_config(config_path: &Path) -> CliResult<Value> {
    let config = StorageConfig::load(config_path)?;
    Ok(serde_json::to_value(&config)?)
}

/// Build a tuple from `record_json` and describe its layout.
///
/// With `parts`, the tuple is bound to a format built from them and
/// validated against it; otherwise the default runtime format is used.
pub fn inspect(
    config: &StorageConfig,
    record_json: &str,
    parts: Option<&KeyPartsArg>,
) -> CliResult<Value> {
    let ctx = StorageContext::new(config);
    let record = json_to_record(record_json)?;

    let pin = match parts {
        Some(parts) => Some(ctx.pin_format(&FormatDef::runtime(vec![KeyDef::from_fields(
            &parts.0,
        )]))?),
        None => None,
    };
    let tuple = match &pin {
        Some(pin) => ctx.new_tuple_with_format(pin.id(), &record)?,
        None => ctx.new_tuple(&record)?,
    };

    Ok(json!({
        "tuple": tuple.to_string(),
        "format_id": tuple.format_id().value(),
        "field_count": tuple.field_count(),
        "bsize": tuple.bsize(),
        "data_offset": tuple.data_offset(),
        "fields": describe_fields(&tuple),
        "quota_used": ctx.quota().used(),
    }))
}

fn describe_fields(tuple: &Tuple) -> Vec<Value> {
    tuple
        .fields()
        .enumerate()
        .map(|(fieldno, field)| {
            json!({
                "fieldno": fieldno,
                "type": type_of(field[0]).as_str(),
                "indexed": tuple.format().is_indexed(fieldno as u32),
                "size": field.len(),
            })
        })
        .collect()
}

/// Extract the key `parts` names from `record_json`
pub fn extract_key(
    config: &StorageConfig,
    record_json: &str,
    parts: &KeyPartsArg,
) -> CliResult<Value> {
    let ctx = StorageContext::new(config);
    let tuple = ctx.new_tuple(&json_to_record(record_json)?)?;
    let key = tuple.extract_key(&KeyDef::from_fields(&parts.0))?;

    Ok(json!({
        "key": format_record(&key),
        "part_count": parts.0.len(),
        "bsize": key.len(),
    }))
}
