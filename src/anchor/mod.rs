//! Comment mapping: resolve findings to exact new-side diff coordinates.
//!
//! A finding is anchored only when its `(file, line)` is the new-side
//! number of an added or context line in one of that file's hunks in the
//! chunk the finding came from. Everything else is rejected with a reason,
//! so no comment is ever posted on a line the diff does not show.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::diff::ReviewChunk;
use crate::models::diff::{Hunk, LineOrigin};
use crate::models::finding::Finding;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnchorError {
    #[error("file `{0}` is not part of the reviewed chunk")]
    UnknownFile(String),

    #[error("`{file}:{line}` points at a removed line")]
    RemovedLine { file: String, line: u32 },

    #[error("`{file}:{line}` is outside the changed hunks")]
    OutOfRange { file: String, line: u32 },
}

/// Resolved comment position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Anchor {
    /// Review path as it appears in the diff.
    pub file: String,
    /// First (or only) new-side line.
    pub line: u32,
    /// Last new-side line of a multi-line range within one hunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// The finding asked for a longer range than could be anchored.
    pub narrowed: bool,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchoredFinding {
    pub finding: Finding,
    pub anchor: Anchor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFinding {
    pub finding: Finding,
    pub error: AnchorError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedFindings {
    pub anchored: Vec<AnchoredFinding>,
    pub rejected: Vec<RejectedFinding>,
}

/// Commentable and removed line numbers of one hunk.
struct HunkLines {
    anchorable: BTreeSet<u32>,
    removed_old: BTreeSet<u32>,
}

impl HunkLines {
    fn new(hunk: &Hunk) -> Self {
        Self {
            anchorable: hunk.anchorable_lines().collect(),
            removed_old: hunk
                .lines
                .iter()
                .filter(|l| l.origin == LineOrigin::Removed)
                .filter_map(|l| l.old_line_no)
                .collect(),
        }
    }
}

/// Per-file line index of a chunk.
struct ChunkIndex<'a> {
    files: IndexMap<&'a str, Vec<HunkLines>>,
}

impl<'a> ChunkIndex<'a> {
    fn new(chunk: &'a ReviewChunk) -> Self {
        let mut files: IndexMap<&str, Vec<HunkLines>> = IndexMap::new();
        for hunk in &chunk.hunks {
            files
                .entry(hunk.file.as_str())
                .or_default()
                .push(HunkLines::new(hunk));
        }
        Self { files }
    }

    /// Find the chunk's spelling of a model-reported path.
    fn resolve_path(&self, reported: &str) -> Option<&'a str> {
        if let Some((path, _)) = self.files.get_key_value(reported) {
            return Some(*path);
        }
        let normalized = normalize_path(reported);
        self.files.get_key_value(normalized.as_str()).map(|(path, _)| *path)
    }
}

/// Strip prefixes models commonly add to repo-relative paths.
pub fn normalize_path(path: &str) -> String {
    let mut path = path.trim().replace('\\', "/");
    loop {
        let stripped = path
            .strip_prefix("./")
            .or_else(|| path.strip_prefix("a/"))
            .or_else(|| path.strip_prefix("b/"))
            .or_else(|| path.strip_prefix('/'));
        match stripped {
            Some(rest) => path = rest.to_string(),
            None => return path,
        }
    }
}

/// Anchor each finding against the hunks of the chunk it was produced for.
pub fn map_findings(findings: Vec<Finding>, chunk: &ReviewChunk) -> MappedFindings {
    let index = ChunkIndex::new(chunk);
    let mut mapped = MappedFindings::default();

    for mut finding in findings {
        match anchor_one(&index, &finding, chunk.index) {
            Ok(anchor) => {
                finding.file = anchor.file.clone();
                finding.end_line = anchor.end_line;
                mapped.anchored.push(AnchoredFinding { finding, anchor });
            }
            Err(error) => {
                tracing::debug!(%error, chunk = chunk.index, "rejecting finding");
                mapped.rejected.push(RejectedFinding { finding, error });
            }
        }
    }

    mapped
}

fn anchor_one(index: &ChunkIndex<'_>, finding: &Finding, chunk_index: usize) -> Result<Anchor, AnchorError> {
    let file = index
        .resolve_path(&finding.file)
        .ok_or_else(|| AnchorError::UnknownFile(finding.file.clone()))?;
    let hunks = index.files.get(file).map(Vec::as_slice).unwrap_or_default();
    let line = finding.line;

    let Some(hunk) = hunks.iter().find(|h| h.anchorable.contains(&line)) else {
        let removed = hunks.iter().any(|h| h.removed_old.contains(&line));
        return Err(if removed {
            AnchorError::RemovedLine {
                file: file.to_string(),
                line,
            }
        } else {
            AnchorError::OutOfRange {
                file: file.to_string(),
                line,
            }
        });
    };

    // A range spanning hunks (or ending off the diff) narrows to its start.
    let requested = finding.end_line.filter(|&end| end > line);
    let end_line = requested.filter(|end| hunk.anchorable.contains(end));

    Ok(Anchor {
        file: file.to_string(),
        line,
        end_line,
        narrowed: requested.is_some() && end_line.is_none(),
        chunk_index,
    })
}
