//! Structured-block boundary detection in free-form model output.
//!
//! This is the only lenient step of response parsing. Candidates are
//! tried in order: `<review>` markers, a fenced ```json block, then the
//! first balanced span shaped like a findings block.

use std::sync::LazyLock;

use crate::prompt::{REVIEW_CLOSE, REVIEW_OPEN};

/// Content inside a ```json fence. The closing fence must start a line so
/// that backticks inside JSON string values don't end the match.
static JSON_FENCE_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?si)```json[ \t]*\r?\n(.*?)\r?\n[ \t]*```").expect("valid regex")
});

/// Locate the structured block in `text`.
///
/// Returns `None` when no candidate block exists at all.
pub fn extract_block(text: &str) -> Option<&str> {
    let region = between_markers(text).unwrap_or(text);

    if let Some(inner) = JSON_FENCE_RE
        .captures(region)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
    {
        return Some(inner);
    }

    first_balanced(region)
}

/// Text between the review markers, if both are present in order.
fn between_markers(text: &str) -> Option<&str> {
    let start = text.find(REVIEW_OPEN)? + REVIEW_OPEN.len();
    let end = text[start..].find(REVIEW_CLOSE)? + start;
    Some(text[start..end].trim())
}

/// The first balanced `{...}` or `[...]` span that parses as a findings
/// block. Valid JSON of any other shape (`[1]`, `{}` in prose) is skipped.
/// Without a match, the first span that is not valid JSON is returned so
/// the caller reports the syntax error.
fn first_balanced(text: &str) -> Option<&str> {
    let mut fallback = None;
    for (start, c) in text.char_indices() {
        if c != '{' && c != '[' {
            continue;
        }
        let Some(end) = balanced_end(&text[start..]) else {
            continue;
        };
        let span = &text[start..start + end];
        match serde_json::from_str::<serde_json::Value>(span) {
            Ok(value) if is_findings_shaped(&value) => return Some(span),
            Ok(_) => {}
            Err(_) => {
                fallback.get_or_insert(span);
            }
        }
    }
    fallback
}

/// An object with a `findings` key, or an array of objects.
fn is_findings_shaped(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => map.contains_key("findings"),
        serde_json::Value::Array(items) => items.iter().all(serde_json::Value::is_object),
        _ => false,
    }
}

/// Byte length of the balanced span starting at `text[0]`, tracking
/// string literals so brackets inside strings are ignored.
fn balanced_end(text: &str) -> Option<usize> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
