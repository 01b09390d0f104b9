//! Chunk planner.
//!
//! Packs whole hunks into request-sized chunks so each model call stays
//! within its context budget. Hunks are never split: a hunk larger than
//! the budget becomes its own oversized chunk and the prompt truncates it.

use serde::Serialize;

use crate::models::diff::{FileDiff, Hunk};
use crate::models::report::{RunReport, SkipNote, SkipReason, Subject};

/// A group of hunks reviewed in one model call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewChunk {
    /// Position in the plan, starting at 0.
    pub index: usize,
    pub hunks: Vec<Hunk>,
    /// Cumulative diff line count of `hunks`.
    pub line_count: usize,
    /// Set when the chunk holds a single hunk larger than the budget.
    pub oversized: bool,
}

impl ReviewChunk {
    /// Distinct file paths in first-seen order.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for hunk in &self.hunks {
            if !files.iter().any(|f| f == &hunk.file) {
                files.push(hunk.file.clone());
            }
        }
        files
    }

    /// Report subject for notes about this chunk.
    pub fn subject(&self) -> Subject {
        Subject::Chunk {
            index: self.index,
            files: self.files(),
        }
    }
}

fn flush(hunks: &mut Vec<Hunk>, lines: &mut usize, chunks: &mut Vec<ReviewChunk>) {
    if hunks.is_empty() {
        return;
    }
    chunks.push(ReviewChunk {
        index: chunks.len(),
        hunks: std::mem::take(hunks),
        line_count: std::mem::take(lines),
        oversized: false,
    });
}

/// Greedily pack hunks into chunks of at most `max_lines` lines.
///
/// At most `max_files` distinct files are planned (`0` means unlimited);
/// the rest are recorded as `BudgetExceeded`. Every hunk of a planned
/// file lands in exactly one chunk.
pub fn plan_chunks(
    files: Vec<FileDiff>,
    max_lines: usize,
    max_files: usize,
    report: &mut RunReport,
) -> Vec<ReviewChunk> {
    let max_lines = max_lines.max(1);
    let mut chunks: Vec<ReviewChunk> = Vec::new();
    let mut current: Vec<Hunk> = Vec::new();
    let mut current_lines = 0;

    for (planned, file) in files.into_iter().enumerate() {
        if max_files > 0 && planned >= max_files {
            tracing::info!(file = %file.path(), max_files, "file budget exhausted");
            report.record(SkipNote::file(
                file.path(),
                SkipReason::BudgetExceeded { max_files },
            ));
            continue;
        }

        for hunk in file.hunks {
            let lines = hunk.len();

            if lines > max_lines {
                flush(&mut current, &mut current_lines, &mut chunks);
                report.record(SkipNote::new(
                    Subject::Hunk {
                        file: hunk.file.clone(),
                        new_start: hunk.new_start,
                        lines,
                    },
                    SkipReason::Truncated {
                        lines,
                        shown: max_lines,
                    },
                ));
                chunks.push(ReviewChunk {
                    index: chunks.len(),
                    hunks: vec![hunk],
                    line_count: lines,
                    oversized: true,
                });
                continue;
            }

            if current_lines + lines > max_lines {
                flush(&mut current, &mut current_lines, &mut chunks);
            }
            current_lines += lines;
            current.push(hunk);
        }
    }
    flush(&mut current, &mut current_lines, &mut chunks);

    tracing::info!(
        chunks = chunks.len(),
        oversized = chunks.iter().filter(|c| c.oversized).count(),
        "planned review chunks"
    );
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::diff::DiffLine;

    fn hunk(file: &str, start: u32, lines: usize) -> Hunk {
        Hunk {
            file: file.into(),
            old_start: start,
            old_count: lines as u32,
            new_start: start,
            new_count: lines as u32,
            header: None,
            lines: (0..lines)
                .map(|i| DiffLine::context(format!("line {i}"), start + i as u32, start + i as u32))
                .collect(),
        }
    }

    fn file(path: &str, hunks: Vec<Hunk>) -> FileDiff {
        FileDiff {
            old_path: path.into(),
            new_path: path.into(),
            is_new: false,
            is_deleted: false,
            is_rename: false,
            is_binary: false,
            hunks,
        }
    }

    fn total_hunks(chunks: &[ReviewChunk]) -> usize {
        chunks.iter().map(|c| c.hunks.len()).sum()
    }

    #[test]
    fn small_diff_is_one_chunk() {
        let mut report = RunReport::default();
        let chunks = plan_chunks(vec![file("a.rs", vec![hunk("a.rs", 1, 10)])], 500, 0, &mut report);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].line_count, 10);
        assert!(!chunks[0].oversized);
        assert!(report.is_clean());
    }

    #[test]
    fn hunks_packed_greedily_across_files() {
        let mut report = RunReport::default();
        let files = vec![
            file("a.rs", vec![hunk("a.rs", 1, 100), hunk("a.rs", 300, 100)]),
            file("b.rs", vec![hunk("b.rs", 1, 100)]),
        ];
        let chunks = plan_chunks(files, 250, 0, &mut report);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].line_count, 200);
        assert_eq!(chunks[1].files(), vec!["b.rs"]);
        assert_eq!(total_hunks(&chunks), 3);
        assert!(chunks.iter().all(|c| c.line_count <= 250));
    }

    #[test]
    fn chunk_indices_are_sequential() {
        let mut report = RunReport::default();
        let files = vec![file(
            "a.rs",
            (0..5).map(|i| hunk("a.rs", i * 100 + 1, 60)).collect(),
        )];
        let chunks = plan_chunks(files, 100, 0, &mut report);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn oversized_hunk_gets_its_own_flagged_chunk() {
        let mut report = RunReport::default();
        let files = vec![file(
            "big.rs",
            vec![hunk("big.rs", 1, 10), hunk("big.rs", 100, 600), hunk("big.rs", 900, 10)],
        )];
        let chunks = plan_chunks(files, 500, 0, &mut report);
        assert_eq!(chunks.len(), 3);
        assert!(!chunks[0].oversized);
        assert!(chunks[1].oversized);
        assert_eq!(chunks[1].line_count, 600);
        assert_eq!(chunks[1].hunks.len(), 1);
        assert!(!chunks[2].oversized);
        assert!(matches!(
            report.notes[0].reason,
            SkipReason::Truncated { lines: 600, shown: 500 }
        ));
    }

    #[test]
    fn single_600_line_hunk_is_exactly_one_oversized_chunk() {
        let mut report = RunReport::default();
        let chunks = plan_chunks(vec![file("a.rs", vec![hunk("a.rs", 1, 600)])], 500, 0, &mut report);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].oversized);
    }

    #[test]
    fn file_budget_records_remaining_files() {
        let mut report = RunReport::default();
        let files = vec![
            file("a.rs", vec![hunk("a.rs", 1, 5)]),
            file("b.rs", vec![hunk("b.rs", 1, 5)]),
            file("c.rs", vec![hunk("c.rs", 1, 5)]),
        ];
        let chunks = plan_chunks(files, 500, 2, &mut report);
        assert_eq!(chunks[0].files(), vec!["a.rs", "b.rs"]);
        assert_eq!(
            report.notes,
            vec![SkipNote::file("c.rs", SkipReason::BudgetExceeded { max_files: 2 })]
        );
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn empty_input_plans_nothing() {
        let mut report = RunReport::default();
        assert!(plan_chunks(vec![], 500, 50, &mut report).is_empty());
    }
}
