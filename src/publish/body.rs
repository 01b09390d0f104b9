//! Comment body rendering and the hash embedded in it.

use sha2::{Digest, Sha256};

use crate::anchor::Anchor;
use crate::constants::COMMENT_MARKER_PREFIX;
use crate::models::finding::{Finding, Suggestion};

/// Length of the hex body hash used in dedup keys and markers.
const HASH_LEN: usize = 16;

/// Render the visible Markdown body of a review comment.
///
/// Layout: severity/category header, explanation, then per suggestion a
/// description line, a `diff` block and an applyable `suggestion` block.
/// The `suggestion` block is left out when applying it at `anchor` would
/// replace the wrong lines.
pub fn render_body(finding: &Finding, anchor: &Anchor) -> String {
    let mut body = format!(
        "{} **{}** · {}\n\n{}",
        finding.severity.marker(),
        finding.severity,
        finding.category,
        finding.explanation.trim()
    );
    for suggestion in &finding.suggestions {
        body.push_str("\n\n");
        body.push_str(&render_suggestion(suggestion, applies_at(suggestion, anchor)));
    }
    body
}

/// A `suggestion` block replaces exactly the anchored lines.
fn applies_at(suggestion: &Suggestion, anchor: &Anchor) -> bool {
    if anchor.narrowed {
        return false;
    }
    let before_lines = suggestion.before.as_deref().map_or(0, |b| b.lines().count());
    anchor.end_line.is_some() || before_lines <= 1
}

fn render_suggestion(suggestion: &Suggestion, applyable: bool) -> String {
    let mut diff = String::new();
    if let Some(before) = &suggestion.before {
        for line in before.lines() {
            diff.push_str(&format!("-{line}\n"));
        }
    }
    for line in suggestion.after.lines() {
        diff.push_str(&format!("+{line}\n"));
    }

    let description = suggestion.description.trim();
    let description = if description.is_empty() {
        "Suggested change"
    } else {
        description
    };
    let mut out = format!("**Suggestion:** {description}\n\n{}", fenced("diff", &diff));
    if applyable {
        out.push_str("\n\n");
        out.push_str(&fenced("suggestion", &suggestion.after));
    }
    out
}

/// Wrap `content` in a code fence longer than any backtick run inside it.
fn fenced(lang: &str, content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    let content = content.strip_suffix('\n').unwrap_or(content);
    format!("{fence}{lang}\n{content}\n{fence}")
}

/// SHA-256 over the whitespace-normalized body, hex, truncated.
pub fn body_hash(body: &str) -> String {
    let normalized = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

/// Append the hidden hash marker to a rendered body.
pub fn with_marker(body: &str, hash: &str) -> String {
    format!("{body}\n\n{COMMENT_MARKER_PREFIX}{hash} -->")
}

/// The hash carried in a body's hidden marker, if any.
pub fn extract_marker(body: &str) -> Option<&str> {
    let start = body.rfind(COMMENT_MARKER_PREFIX)? + COMMENT_MARKER_PREFIX.len();
    let rest = &body[start..];
    let hash = &rest[..rest.find("-->")?];
    let hash = hash.trim();
    (hash.len() == HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hash)
}

/// Dedup hash of an existing comment: its marker, or a hash of its text.
pub fn dedup_hash(body: &str) -> String {
    extract_marker(body)
        .map(str::to_string)
        .unwrap_or_else(|| body_hash(body))
}
