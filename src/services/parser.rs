//! Decodes a newline-delimited JSON payload into raw documents.

use serde_json::Value;

use crate::error::IngestError;
use crate::models::{RawDocument, raw_metadata_from_json};

/// Parse every line of `payload` into a [`RawDocument`], in order.
///
/// Blank lines are skipped. Any other line that is not a JSON object fails
/// the whole payload.
pub fn parse_documents(payload: &[u8]) -> Result<Vec<RawDocument>, IngestError> {
    let text = std::str::from_utf8(payload).map_err(|e| IngestError::MalformedInput {
        line: line_of_offset(payload, e.valid_up_to()),
        reason: format!("invalid UTF-8: {}", e),
    })?;

    let mut documents = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        let line_no = i + 1;
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        documents.push(parse_line(line, line_no)?);
    }

    Ok(documents)
}

fn parse_line(line: &str, line_no: usize) -> Result<RawDocument, IngestError> {
    let value: Value = serde_json::from_str(line).map_err(|e| IngestError::MalformedInput {
        line: line_no,
        reason: e.to_string(),
    })?;

    let Value::Object(mut object) = value else {
        return Err(IngestError::MalformedInput {
            line: line_no,
            reason: "expected a JSON object".to_string(),
        });
    };

    let text = match object.remove("text") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            return Err(IngestError::InvalidDocument {
                line: line_no,
                reason: format!("'text' must be a string, found {}", json_type(&other)),
            });
        }
    };

    let metadata = match object.remove("metadata") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(raw_metadata_from_json(map)),
        Some(other) => {
            return Err(IngestError::InvalidDocument {
                line: line_no,
                reason: format!("'metadata' must be an object, found {}", json_type(&other)),
            });
        }
    };

    Ok(RawDocument {
        line: line_no,
        text,
        metadata,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn line_of_offset(payload: &[u8], offset: usize) -> usize {
    payload[..offset].iter().filter(|b| **b == b'\n').count() + 1
}
