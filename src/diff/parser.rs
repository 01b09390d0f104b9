//! Unified diff normalizer.
//!
//! Parses the output of `git diff` (unified format) into per-file hunks
//! with dual old/new line numbering. A malformed hunk header fails only
//! the file it belongs to; the other files are still returned.

use std::iter::Peekable;
use std::str::Lines;

use super::DiffError;
use crate::models::diff::{DiffLine, FileDiff, Hunk};
use crate::models::report::{SkipNote, SkipReason};

/// Result of normalizing a raw diff.
#[derive(Debug, Default)]
pub struct NormalizedDiff {
    /// Successfully parsed files, in lexical order of their review path.
    pub files: Vec<FileDiff>,
    /// One note per file whose hunks could not be parsed.
    pub failures: Vec<SkipNote>,
}

/// Parse a unified diff string into per-file hunk groups.
pub fn normalize(input: &str) -> NormalizedDiff {
    let mut result = NormalizedDiff::default();
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        // Look for "diff --git a/... b/..."
        if !line.starts_with("diff --git ") {
            continue;
        }

        let (old_path, new_path) = parse_diff_header(line);
        match parse_file(&mut lines, old_path, new_path) {
            Ok(file) => result.files.push(file),
            Err((path, err)) => {
                tracing::warn!(file = %path, error = %err, "skipping file with malformed diff");
                result
                    .failures
                    .push(SkipNote::file(path, SkipReason::DiffParse(err.to_string())));
            }
        }
    }

    // Stable sort keeps diff order for (unusual) duplicate paths.
    result.files.sort_by(|a, b| a.path().cmp(b.path()));
    result
}

/// Parse the extended headers and hunks of one file section.
///
/// Always consumes the whole section, even on error, so the caller resumes
/// at the next `diff --git` line.
fn parse_file(
    lines: &mut Peekable<Lines<'_>>,
    old_path: String,
    new_path: String,
) -> Result<FileDiff, (String, DiffError)> {
    let mut file = FileDiff {
        old_path,
        new_path,
        is_new: false,
        is_deleted: false,
        is_rename: false,
        is_binary: false,
        hunks: Vec::new(),
    };
    let mut error: Option<DiffError> = None;

    while let Some(&next) = lines.peek() {
        if next.starts_with("diff --git ") {
            break;
        }
        if next.starts_with("new file mode") {
            file.is_new = true;
        } else if next.starts_with("deleted file mode") {
            file.is_deleted = true;
        } else if next.starts_with("rename from") || next.starts_with("rename to") {
            file.is_rename = true;
        } else if next.starts_with("Binary files") || next.starts_with("GIT binary patch") {
            file.is_binary = true;
        } else if next.starts_with("@@") {
            let review_path = file.path().to_string();
            match parse_hunk(lines, &review_path) {
                Ok(hunk) => file.hunks.push(hunk),
                Err(e) => {
                    error.get_or_insert(e);
                }
            }
            continue;
        }
        // index, similarity, mode, ---/+++ and unknown headers carry nothing we need.
        lines.next();
    }

    match error {
        Some(e) => Err((file.path().to_string(), e)),
        None => Ok(file),
    }
}

/// Parse the "diff --git a/path b/path" header line.
fn parse_diff_header(line: &str) -> (String, String) {
    let rest = line.strip_prefix("diff --git ").unwrap_or(line);

    // Paths are prefixed with a/ and b/ (default), or c/w/i/o/ when
    // git's diff.mnemonicPrefix is enabled. Paths may contain spaces.
    if let Some(b_idx) = find_second_prefix(rest) {
        let old_path = strip_diff_prefix(&rest[..b_idx]).to_string();
        let new_path = strip_diff_prefix(&rest[b_idx + 1..]).to_string();
        (old_path, new_path)
    } else {
        let mut parts = rest.splitn(2, ' ');
        let old_path = strip_diff_prefix(parts.next().unwrap_or("")).to_string();
        let new_path = strip_diff_prefix(parts.next().unwrap_or("")).to_string();
        (old_path, new_path)
    }
}

/// Strip a single-character git diff prefix (`a/`, `b/`, `c/`, `w/`, `i/`, `o/`).
pub(crate) fn strip_diff_prefix(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2
        && bytes[1] == b'/'
        && matches!(bytes[0], b'a' | b'b' | b'c' | b'w' | b'i' | b'o')
    {
        return &path[2..];
    }
    path
}

/// Find the position of the second path prefix separator in a diff header.
fn find_second_prefix(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (1..bytes.len().saturating_sub(1)).find(|&i| {
        bytes[i] == b' '
            && bytes.get(i + 2) == Some(&b'/')
            && matches!(bytes.get(i + 1), Some(b'a' | b'b' | b'c' | b'w' | b'i' | b'o'))
    })
}

/// Parse a single hunk starting with its `@@` line.
///
/// The body ends when both line counts from the header are consumed, or
/// at the next hunk/file header, whichever comes first.
fn parse_hunk(lines: &mut Peekable<Lines<'_>>, file: &str) -> Result<Hunk, DiffError> {
    let header_line = lines.next().unwrap_or_default();
    let (old_start, old_count, new_start, new_count, header) = parse_hunk_header(header_line)
        .ok_or_else(|| DiffError::MalformedHunk(header_line.to_string()))?;

    let mut hunk_lines: Vec<DiffLine> = Vec::new();
    let mut old_line = old_start;
    let mut new_line = new_start;
    let mut old_left = old_count;
    let mut new_left = new_count;

    while let Some(&next) = lines.peek() {
        if next.starts_with("diff --git ") || next.starts_with("@@") {
            break;
        }
        if next.starts_with('\\') {
            // "\ No newline at end of file"
            lines.next();
            continue;
        }
        if old_left == 0 && new_left == 0 {
            break;
        }

        if let Some(content) = next.strip_prefix('+') {
            hunk_lines.push(DiffLine::added(content, new_line));
            new_line += 1;
            new_left = new_left.saturating_sub(1);
        } else if let Some(content) = next.strip_prefix('-') {
            hunk_lines.push(DiffLine::removed(content, old_line));
            old_line += 1;
            old_left = old_left.saturating_sub(1);
        } else if next.starts_with(' ') || next.is_empty() {
            let content = next.get(1..).unwrap_or("");
            hunk_lines.push(DiffLine::context(content, old_line, new_line));
            old_line += 1;
            new_line += 1;
            old_left = old_left.saturating_sub(1);
            new_left = new_left.saturating_sub(1);
        } else {
            // Unknown line format ends the hunk.
            break;
        }
        lines.next();
    }

    Ok(Hunk {
        file: file.to_string(),
        old_start,
        old_count,
        new_start,
        new_count,
        header,
        lines: hunk_lines,
    })
}

/// Parse a `@@ -old_start,old_count +new_start,new_count @@ header` line.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32, Option<String>)> {
    let line = line.strip_prefix("@@ ")?;
    let end = line.find(" @@")?;
    let range_part = &line[..end];
    let header = Some(line[end + 3..].trim())
        .filter(|h| !h.is_empty())
        .map(str::to_string);

    let (old, new) = range_part.split_once(' ')?;
    let (old_start, old_count) = parse_range(old.strip_prefix('-')?)?;
    let (new_start, new_count) = parse_range(new.strip_prefix('+')?)?;

    Some((old_start, old_count, new_start, new_count, header))
}

/// Parse "start,count" or "start" (count defaults to 1).
fn parse_range(s: &str) -> Option<(u32, u32)> {
    match s.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Render normalized files back into unified diff text.
///
/// Extended headers are reduced to what the normalized model keeps, so
/// the output is structurally (not byte-for-byte) equal to the input.
pub fn render(files: &[FileDiff]) -> String {
    let mut out = String::new();
    for file in files {
        out.push_str(&format!("diff --git a/{} b/{}\n", file.old_path, file.new_path));
        if file.is_new {
            out.push_str("new file mode 100644\n");
        }
        if file.is_deleted {
            out.push_str("deleted file mode 100644\n");
        }
        if file.is_rename {
            out.push_str(&format!("rename from {}\n", file.old_path));
            out.push_str(&format!("rename to {}\n", file.new_path));
        }
        if file.is_binary {
            out.push_str(&format!(
                "Binary files a/{} and b/{} differ\n",
                file.old_path, file.new_path
            ));
            continue;
        }
        let old_label = if file.is_new {
            "/dev/null".to_string()
        } else {
            format!("a/{}", file.old_path)
        };
        let new_label = if file.is_deleted {
            "/dev/null".to_string()
        } else {
            format!("b/{}", file.new_path)
        };
        out.push_str(&format!("--- {old_label}\n+++ {new_label}\n"));
        for hunk in &file.hunks {
            out.push_str(&hunk.header_line());
            out.push('\n');
            for line in &hunk.lines {
                out.push(line.origin.prefix());
                out.push_str(&line.content);
                out.push('\n');
            }
        }
    }
    out
}
