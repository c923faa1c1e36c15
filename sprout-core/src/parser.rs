//! Response parser: model text to [`PlantInfo`].
//!
//! The text is untrusted. Two failures are kept apart: text that is not JSON
//! at all, and JSON whose shape does not match the record.

use serde_json::Value;
use thiserror::Error;

use crate::models::PlantInfo;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("response JSON does not match the plant schema: {0}")]
    ShapeMismatch(#[source] serde_json::Error),
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::Malformed(_) => "parse",
            ParseError::ShapeMismatch(_) => "shape",
        }
    }
}

/// Parse the model's reply into a [`PlantInfo`].
pub fn parse_plant_info(text: &str) -> Result<PlantInfo, ParseError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body).map_err(ParseError::Malformed)?;
    serde_json::from_value(value).map_err(ParseError::ShapeMismatch)
}

/// Remove one surrounding Markdown fence (```` ```json ... ``` ````), if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    match inner.find('\n') {
        Some(idx) => inner[idx + 1..].trim(),
        None => inner
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric())
            .trim(),
    }
}
