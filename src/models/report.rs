//! Run report: every skipped, truncated or failed unit of one review run.
//!
//! Each pipeline stage records what it could not handle as a [`SkipNote`]
//! instead of failing. The notes are merged into a single [`RunReport`]
//! that backs the end-of-review summary comment.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::finding::Severity;

/// The unit of work a note is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Subject {
    File {
        path: String,
    },
    Hunk {
        file: String,
        new_start: u32,
        lines: usize,
    },
    Chunk {
        index: usize,
        files: Vec<String>,
    },
    Finding {
        file: Option<String>,
        line: Option<u32>,
    },
    Comment {
        file: String,
        line: u32,
    },
    Run,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::File { path } => write!(f, "`{path}`"),
            Subject::Hunk {
                file, new_start, ..
            } => write!(f, "`{file}` hunk at line {new_start}"),
            Subject::Chunk { index, files } => {
                write!(f, "chunk #{} ({})", index + 1, files.join(", "))
            }
            Subject::Finding { file, line } => match (file, line) {
                (Some(file), Some(line)) => write!(f, "finding at `{file}:{line}`"),
                (Some(file), None) => write!(f, "finding in `{file}`"),
                _ => write!(f, "finding"),
            },
            Subject::Comment { file, line } => write!(f, "comment at `{file}:{line}`"),
            Subject::Run => write!(f, "review run"),
        }
    }
}

/// Why a unit was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The diff section for this file could not be parsed.
    DiffParse(String),
    /// Matched an exclude pattern or missed every include pattern.
    Excluded,
    Binary,
    /// Deleted files have no new-side lines to comment on.
    Deleted,
    HunkTooLarge { lines: usize, cap: usize },
    /// Reviewed, but the prompt only carried the first `shown` lines.
    Truncated { lines: usize, shown: usize },
    /// Not reviewed because the file budget was exhausted.
    BudgetExceeded { max_files: usize },
    ReviewFailed(String),
    ResponseParse(String),
    FindingDropped(String),
    LowConfidence { confidence: String, min: String },
    Unanchorable(String),
    PublishFailed(String),
    Cancelled,
}

impl SkipReason {
    /// Informational notes describe degraded but completed work.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            SkipReason::Excluded | SkipReason::Truncated { .. } | SkipReason::BudgetExceeded { .. }
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DiffParse(e) => write!(f, "skipped: diff could not be parsed ({e})"),
            SkipReason::Excluded => write!(f, "skipped: excluded by pattern"),
            SkipReason::Binary => write!(f, "skipped: binary file"),
            SkipReason::Deleted => write!(f, "skipped: file deleted"),
            SkipReason::HunkTooLarge { lines, cap } => {
                write!(f, "skipped: too large ({lines} lines, cap {cap})")
            }
            SkipReason::Truncated { lines, shown } => {
                write!(f, "truncated: reviewed first {shown} of {lines} lines")
            }
            SkipReason::BudgetExceeded { max_files } => {
                write!(f, "not reviewed: budget exceeded ({max_files} files max)")
            }
            SkipReason::ReviewFailed(e) => write!(f, "skipped: review failed ({e})"),
            SkipReason::ResponseParse(e) => write!(f, "skipped: response not parseable ({e})"),
            SkipReason::FindingDropped(e) => write!(f, "dropped: {e}"),
            SkipReason::LowConfidence { confidence, min } => {
                write!(f, "dropped: confidence {confidence} below {min}")
            }
            SkipReason::Unanchorable(e) => write!(f, "dropped: {e}"),
            SkipReason::PublishFailed(e) => write!(f, "not posted: {e}"),
            SkipReason::Cancelled => write!(f, "not reviewed: run cancelled"),
        }
    }
}

/// One recorded skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipNote {
    pub subject: Subject,
    #[serde(flatten)]
    pub reason: SkipReason,
}

impl SkipNote {
    pub fn new(subject: Subject, reason: SkipReason) -> Self {
        Self { subject, reason }
    }

    pub fn file(path: impl Into<String>, reason: SkipReason) -> Self {
        Self::new(Subject::File { path: path.into() }, reason)
    }
}

impl fmt::Display for SkipNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.reason)
    }
}

/// Aggregated outcome of one review run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub files_reviewed: usize,
    pub chunks_planned: usize,
    pub chunks_reviewed: usize,
    pub findings_parsed: usize,
    pub findings_anchored: usize,
    pub comments_posted: usize,
    pub comments_duplicate: usize,
    /// Posted comments per severity.
    pub comments_by_severity: BTreeMap<Severity, usize>,
    pub cancelled: bool,
    pub notes: Vec<SkipNote>,
}

impl RunReport {
    pub fn record(&mut self, note: SkipNote) {
        tracing::debug!(%note, "recorded skip");
        self.notes.push(note);
    }

    pub fn extend(&mut self, notes: impl IntoIterator<Item = SkipNote>) {
        for note in notes {
            self.record(note);
        }
    }

    /// Notes that represent lost review coverage rather than policy.
    pub fn failures(&self) -> impl Iterator<Item = &SkipNote> {
        self.notes.iter().filter(|n| !n.reason.is_informational())
    }

    /// Posted comments per severity, highest first, e.g. `1 critical, 2 medium`.
    ///
    /// Levels without comments are left out; `None` when nothing was posted.
    pub fn severity_breakdown(&self) -> Option<String> {
        let parts: Vec<String> = Severity::ALL
            .iter()
            .filter_map(|severity| {
                let count = self.comments_by_severity.get(severity).copied().unwrap_or(0);
                (count > 0).then(|| format!("{count} {severity}"))
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }

    /// Whether anything at all needs to be surfaced to the reader.
    pub fn is_clean(&self) -> bool {
        self.notes.is_empty() && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_display_reads_naturally() {
        let note = SkipNote::new(
            Subject::Hunk {
                file: "src/big.rs".into(),
                new_start: 40,
                lines: 1200,
            },
            SkipReason::HunkTooLarge {
                lines: 1200,
                cap: 1000,
            },
        );
        assert_eq!(
            note.to_string(),
            "`src/big.rs` hunk at line 40: skipped: too large (1200 lines, cap 1000)"
        );
    }

    #[test]
    fn budget_and_exclusion_are_informational() {
        let mut report = RunReport::default();
        report.record(SkipNote::file("README.md", SkipReason::Excluded));
        report.record(SkipNote::file(
            "z.rs",
            SkipReason::BudgetExceeded { max_files: 1 },
        ));
        report.record(SkipNote::file("bin.png", SkipReason::Binary));
        assert_eq!(report.failures().count(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn severity_breakdown_lists_highest_first() {
        let mut report = RunReport::default();
        assert_eq!(report.severity_breakdown(), None);

        report.comments_by_severity.insert(Severity::Low, 3);
        report.comments_by_severity.insert(Severity::Critical, 1);
        report.comments_by_severity.insert(Severity::High, 0);
        assert_eq!(
            report.severity_breakdown().as_deref(),
            Some("1 critical, 3 low")
        );
    }

    #[test]
    fn empty_report_is_clean() {
        assert!(RunReport::default().is_clean());
    }
}
