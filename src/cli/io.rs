//! JSON I/O handling for CLI
//!
//! - Input: one JSON array, from the command line or a line of stdin
//! - Output: one JSON object per line, normally stdout
//! - UTF-8 only

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Take the record argument, or read one line from stdin when absent
pub fn read_record_json(arg: Option<String>) -> CliResult<String> {
    if let Some(arg) = arg {
        return Ok(arg);
    }
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;

    if line.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    Ok(line)
}

/// Encode a JSON array as a MessagePack record
pub fn json_to_record(json: &str) -> CliResult<Vec<u8>> {
    let value: Value = serde_json::from_str(json)?;
    if !value.is_array() {
        return Err(CliError::invalid_record("expected a JSON array"));
    }
    rmp_serde::to_vec(&value).map_err(|e| CliError::invalid_record(e.to_string()))
}

/// Write a success response as one line to `out`
pub fn write_response<W: Write>(out: &mut W, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_array_to_record() {
        let record = json_to_record(r#"[1, "ab", null]"#).unwrap();
        assert_eq!(record, vec![0x93, 0x01, 0xa2, b'a', b'b', 0xc0]);
    }

    #[test]
    fn test_non_array_rejected() {
        let err = json_to_record(r#"{"a": 1}"#).unwrap_err();
        assert_eq!(err.code_str(), "TUPLEBOX_CLI_INVALID_RECORD");
    }

    #[test]
    fn test_argument_preferred_over_stdin() {
        assert_eq!(read_record_json(Some("[1]".into())).unwrap(), "[1]");
    }

    #[test]
    fn test_response_is_one_line() {
        let mut out = Vec::new();
        write_response(&mut out, serde_json::json!({"a": [1, 2]})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.lines().count(), 1);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["data"]["a"][1], 2);
    }
}
