//! Diff-related types: file diffs, hunks, and diff lines.

use serde::{Deserialize, Serialize};

/// Which side of the diff a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineOrigin {
    /// Line exists only in the new version (added).
    Added,
    /// Line exists only in the old version (removed).
    Removed,
    /// Line is unchanged (context).
    Context,
}

impl LineOrigin {
    /// The unified-diff prefix character for this origin.
    pub fn prefix(self) -> char {
        match self {
            LineOrigin::Added => '+',
            LineOrigin::Removed => '-',
            LineOrigin::Context => ' ',
        }
    }
}

/// A single line in a diff hunk.
///
/// Added lines carry only a new-side number, removed lines only an
/// old-side number, context lines both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// The type of change.
    pub origin: LineOrigin,
    /// The content of the line (without the leading +/-/space).
    pub content: String,
    /// Line number in the old file (None for added lines).
    pub old_line_no: Option<u32>,
    /// Line number in the new file (None for removed lines).
    pub new_line_no: Option<u32>,
}

impl DiffLine {
    pub fn added(content: impl Into<String>, new_line_no: u32) -> Self {
        Self {
            origin: LineOrigin::Added,
            content: content.into(),
            old_line_no: None,
            new_line_no: Some(new_line_no),
        }
    }

    pub fn removed(content: impl Into<String>, old_line_no: u32) -> Self {
        Self {
            origin: LineOrigin::Removed,
            content: content.into(),
            old_line_no: Some(old_line_no),
            new_line_no: None,
        }
    }

    pub fn context(content: impl Into<String>, old_line_no: u32, new_line_no: u32) -> Self {
        Self {
            origin: LineOrigin::Context,
            content: content.into(),
            old_line_no: Some(old_line_no),
            new_line_no: Some(new_line_no),
        }
    }

    /// Whether a review comment can be attached to this line.
    pub fn is_anchorable(&self) -> bool {
        self.origin != LineOrigin::Removed && self.new_line_no.is_some()
    }
}

/// A contiguous hunk within a file diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Review path of the file this hunk belongs to.
    pub file: String,
    /// Starting line in the old file.
    pub old_start: u32,
    /// Number of lines in the old file.
    pub old_count: u32,
    /// Starting line in the new file.
    pub new_start: u32,
    /// Number of lines in the new file.
    pub new_count: u32,
    /// Optional hunk header text (e.g., function name).
    pub header: Option<String>,
    /// The lines in this hunk.
    pub lines: Vec<DiffLine>,
}

impl Hunk {
    /// Number of diff lines in the hunk; the unit of every size budget.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// New-side line numbers a comment may be anchored to.
    pub fn anchorable_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines
            .iter()
            .filter(|l| l.is_anchorable())
            .filter_map(|l| l.new_line_no)
    }

    /// Render the `@@ -a,b +c,d @@ header` line.
    pub fn header_line(&self) -> String {
        match self.header {
            Some(ref header) => format!(
                "@@ -{},{} +{},{} @@ {header}",
                self.old_start, self.old_count, self.new_start, self.new_count
            ),
            None => format!(
                "@@ -{},{} +{},{} @@",
                self.old_start, self.old_count, self.new_start, self.new_count
            ),
        }
    }
}

/// A diff for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    /// Path of the old file.
    pub old_path: String,
    /// Path of the new file.
    pub new_path: String,
    /// Whether this is a new file.
    pub is_new: bool,
    /// Whether this file was deleted.
    pub is_deleted: bool,
    /// Whether this is a rename.
    pub is_rename: bool,
    /// Whether this is a binary file.
    pub is_binary: bool,
    /// The hunks in this diff.
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Returns the most relevant file path (new_path for non-deletes, old_path for deletes).
    pub fn path(&self) -> &str {
        if self.is_deleted {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// Total number of diff lines across all hunks.
    pub fn line_count(&self) -> usize {
        self.hunks.iter().map(Hunk::len).sum()
    }

    /// Returns the total number of added lines across all hunks.
    pub fn added_lines(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.origin == LineOrigin::Added)
            .count()
    }

    /// Returns the total number of removed lines across all hunks.
    pub fn removed_lines(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.origin == LineOrigin::Removed)
            .count()
    }
}
