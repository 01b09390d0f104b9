//! Model response parsing into typed findings.
//!
//! Only the block boundary detection in [`extract`] is lenient. The
//! extracted block must be a `{"findings": [...]}` object (or a bare
//! array); each finding is then validated on its own so one malformed
//! entry does not discard its siblings.

pub mod extract;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::finding::{Finding, Severity, Suggestion};

/// Maximum characters of the raw response quoted in parse errors.
const PARSE_ERROR_PREVIEW_LEN: usize = 200;

/// The response contract: a list of findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReviewEnvelope {
    pub findings: Vec<Finding>,
}

#[derive(Error, Debug)]
pub enum ResponseParseError {
    #[error("empty response")]
    Empty,

    #[error("no structured block found in response: {preview}")]
    NoBlock { preview: String },

    #[error("structured block is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("structured block has unexpected shape: {0}")]
    UnexpectedShape(String),
}

/// A finding that was present in the block but failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFinding {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub findings: Vec<Finding>,
    pub dropped: Vec<DroppedFinding>,
}

/// Loosely-typed finding as it arrives from the model.
#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default, alias = "path")]
    file: Option<String>,
    #[serde(default)]
    line: Option<Value>,
    #[serde(default)]
    end_line: Option<Value>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "message")]
    explanation: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    suggestions: Option<Vec<RawSuggestion>>,
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    after: Option<String>,
}

/// Parse raw model output into findings.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, ResponseParseError> {
    if raw.trim().is_empty() {
        return Err(ResponseParseError::Empty);
    }

    let block = extract::extract_block(raw).ok_or_else(|| ResponseParseError::NoBlock {
        preview: raw.chars().take(PARSE_ERROR_PREVIEW_LEN).collect(),
    })?;

    let items = match serde_json::from_str::<Value>(block)? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("findings") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(ResponseParseError::UnexpectedShape(format!(
                    "\"findings\" is {}, expected an array",
                    json_kind(&other)
                )));
            }
            None => {
                return Err(ResponseParseError::UnexpectedShape(
                    "object has no \"findings\" key".into(),
                ));
            }
        },
        other => {
            return Err(ResponseParseError::UnexpectedShape(format!(
                "top level is {}",
                json_kind(&other)
            )));
        }
    };

    let mut parsed = ParsedResponse::default();
    for item in items {
        match validate(item) {
            Ok(finding) => parsed.findings.push(finding),
            Err(dropped) => {
                tracing::debug!(reason = %dropped.reason, "dropping finding");
                parsed.dropped.push(dropped);
            }
        }
    }
    Ok(parsed)
}

fn validate(item: Value) -> Result<Finding, DroppedFinding> {
    let raw: RawFinding = serde_json::from_value(item).map_err(|e| DroppedFinding {
        file: None,
        line: None,
        reason: format!("malformed finding: {e}"),
    })?;

    let file = raw.file.map(|f| f.trim().to_string()).filter(|f| !f.is_empty());
    let line = raw.line.as_ref().and_then(positive_line);
    let drop = |reason: &str| DroppedFinding {
        file: file.clone(),
        line,
        reason: reason.to_string(),
    };

    let Some(ref path) = file else {
        return Err(drop("missing file"));
    };
    let Some(line) = line else {
        return Err(match raw.line {
            None | Some(Value::Null) => drop("missing line"),
            Some(_) => drop("line is not a positive integer"),
        });
    };
    let explanation = raw.explanation.unwrap_or_default().trim().to_string();
    if explanation.is_empty() {
        return Err(drop("empty explanation"));
    }

    let end_line = raw
        .end_line
        .as_ref()
        .and_then(positive_line)
        .filter(|&end| end > line);

    let suggestions = raw
        .suggestions
        .unwrap_or_default()
        .into_iter()
        .filter_map(|s| match s.after {
            Some(after) => Some(Suggestion {
                description: s.description.unwrap_or_default().trim().to_string(),
                before: s.before.filter(|b| !b.is_empty()),
                after,
            }),
            None => {
                tracing::debug!(file = %path, line, "dropping suggestion without replacement");
                None
            }
        })
        .collect();

    Ok(Finding {
        file: path.clone(),
        line,
        end_line,
        severity: raw
            .severity
            .as_deref()
            .map(Severity::from_label)
            .unwrap_or(Severity::Medium),
        category: raw
            .category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "general".to_string()),
        explanation,
        confidence: raw
            .confidence
            .as_ref()
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0) as f32),
        suggestions,
    })
}

/// Accept `42` or `"42"`; reject zero, negatives and fractions.
fn positive_line(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u32::try_from(n).ok().filter(|&n| n > 0)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
