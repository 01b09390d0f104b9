//! File and hunk filtering ahead of chunk planning.
//!
//! Patterns follow gitignore glob semantics via the `ignore` crate: a
//! pattern without a slash (`*.md`) matches at any depth, `vendor/**`
//! matches a subtree, and `!pattern` re-includes.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use thiserror::Error;

use crate::models::diff::FileDiff;
use crate::models::report::{RunReport, SkipNote, SkipReason, Subject};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("invalid {kind} pattern '{pattern}': {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: ignore::Error,
    },
}

/// Drops files and hunks that should not be sent for review.
#[derive(Debug)]
pub struct FileFilter {
    exclude: Option<Gitignore>,
    include: Option<Gitignore>,
    /// Hunks with more lines than this are dropped. `0` disables the cap.
    max_hunk_lines: usize,
}

impl FileFilter {
    pub fn new(
        exclude: &[String],
        include: &[String],
        max_hunk_lines: usize,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            exclude: build_matcher("exclude", exclude)?,
            include: build_matcher("include", include)?,
            max_hunk_lines,
        })
    }

    /// Whether a review path is excluded by the pattern policy alone.
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = Path::new(path);
        if let Some(ref exclude) = self.exclude {
            if exclude.matched_path_or_any_parents(path, false).is_ignore() {
                return true;
            }
        }
        match self.include {
            Some(ref include) => !include.matched_path_or_any_parents(path, false).is_ignore(),
            None => false,
        }
    }

    /// Apply the policy to every file, recording each drop in `report`.
    ///
    /// Files are independent; order is preserved.
    pub fn apply(&self, files: Vec<FileDiff>, report: &mut RunReport) -> Vec<FileDiff> {
        let mut kept = Vec::with_capacity(files.len());

        for mut file in files {
            let path = file.path().to_string();

            let reason = if self.is_excluded(&path) {
                Some(SkipReason::Excluded)
            } else if file.is_binary {
                Some(SkipReason::Binary)
            } else if file.is_deleted {
                Some(SkipReason::Deleted)
            } else {
                None
            };
            if let Some(reason) = reason {
                tracing::info!(file = %path, %reason, "skipping file");
                report.record(SkipNote::file(path, reason));
                continue;
            }

            if self.max_hunk_lines > 0 {
                let cap = self.max_hunk_lines;
                file.hunks.retain(|hunk| {
                    if hunk.len() <= cap {
                        return true;
                    }
                    tracing::warn!(file = %hunk.file, lines = hunk.len(), cap, "skipping oversized hunk");
                    report.record(SkipNote::new(
                        Subject::Hunk {
                            file: hunk.file.clone(),
                            new_start: hunk.new_start,
                            lines: hunk.len(),
                        },
                        SkipReason::HunkTooLarge {
                            lines: hunk.len(),
                            cap,
                        },
                    ));
                    false
                });
            }

            if file.hunks.is_empty() {
                // Mode changes, pure renames, or every hunk over the cap.
                tracing::debug!(file = %path, "no reviewable hunks left");
                continue;
            }
            kept.push(file);
        }

        kept
    }
}

fn build_matcher(kind: &'static str, patterns: &[String]) -> Result<Option<Gitignore>, FilterError> {
    let patterns: Vec<&str> = patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return Ok(None);
    }

    let invalid = |pattern: &str, source| FilterError::InvalidPattern {
        kind,
        pattern: pattern.to_string(),
        source,
    };

    let mut builder = GitignoreBuilder::new("");
    for pattern in &patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| invalid(pattern, e))?;
    }
    builder
        .build()
        .map(Some)
        .map_err(|e| invalid(&patterns.join(", "), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::diff::{DiffLine, Hunk};

    fn hunk(file: &str, lines: usize) -> Hunk {
        Hunk {
            file: file.into(),
            old_start: 1,
            old_count: 0,
            new_start: 10,
            new_count: lines as u32,
            header: None,
            lines: (0..lines)
                .map(|i| DiffLine::added(format!("line {i}"), 10 + i as u32))
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

    fn patterns(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    fn kept_paths(files: &[FileDiff]) -> Vec<&str> {
        files.iter().map(|f| f.path()).collect()
    }

    #[test]
    fn markdown_excluded_python_kept() {
        let filter = FileFilter::new(&patterns(&["*.md"]), &[], 1000).unwrap();
        let mut report = RunReport::default();
        let kept = filter.apply(
            vec![file("a.py", vec![hunk("a.py", 1)]), file("b.md", vec![hunk("b.md", 3)])],
            &mut report,
        );
        assert_eq!(kept_paths(&kept), vec!["a.py"]);
        assert_eq!(report.notes, vec![SkipNote::file("b.md", SkipReason::Excluded)]);
    }

    #[test]
    fn glob_semantics() {
        let filter =
            FileFilter::new(&patterns(&["*.md", "vendor/**", "*.lock", "!keep.lock"]), &[], 0)
                .unwrap();
        assert!(filter.is_excluded("docs/deep/guide.md"));
        assert!(filter.is_excluded("vendor/lib/x.rs"));
        assert!(filter.is_excluded("Cargo.lock"));
        assert!(!filter.is_excluded("keep.lock"));
        assert!(!filter.is_excluded("src/vendor.rs"));
        assert!(!filter.is_excluded("src/main.rs"));
    }

    #[test]
    fn include_patterns_restrict_files() {
        let filter = FileFilter::new(&[], &patterns(&["src/**/*.rs"]), 0).unwrap();
        assert!(!filter.is_excluded("src/diff/parser.rs"));
        assert!(filter.is_excluded("tests/pipeline.rs"));
        assert!(filter.is_excluded("src/README.md"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter =
            FileFilter::new(&patterns(&["src/generated/**"]), &patterns(&["*.rs"]), 0).unwrap();
        assert!(filter.is_excluded("src/generated/api.rs"));
        assert!(!filter.is_excluded("src/lib.rs"));
    }

    #[test]
    fn oversized_hunk_dropped_siblings_kept() {
        let filter = FileFilter::new(&[], &[], 100).unwrap();
        let mut report = RunReport::default();
        let kept = filter.apply(
            vec![file("big.rs", vec![hunk("big.rs", 150), hunk("big.rs", 20)])],
            &mut report,
        );
        assert_eq!(kept[0].hunks.len(), 1);
        assert_eq!(kept[0].hunks[0].len(), 20);
        assert!(matches!(
            report.notes[0].reason,
            SkipReason::HunkTooLarge { lines: 150, cap: 100 }
        ));
    }

    #[test]
    fn file_with_only_oversized_hunks_is_dropped() {
        let filter = FileFilter::new(&[], &[], 10).unwrap();
        let mut report = RunReport::default();
        let kept = filter.apply(vec![file("big.rs", vec![hunk("big.rs", 11)])], &mut report);
        assert!(kept.is_empty());
        assert_eq!(report.notes.len(), 1);
    }

    #[test]
    fn binary_and_deleted_files_dropped() {
        let filter = FileFilter::new(&[], &[], 0).unwrap();
        let mut binary = file("logo.png", vec![]);
        binary.is_binary = true;
        let mut deleted = file("old.rs", vec![hunk("old.rs", 2)]);
        deleted.is_deleted = true;

        let mut report = RunReport::default();
        let kept = filter.apply(vec![binary, deleted], &mut report);
        assert!(kept.is_empty());
        let reasons: Vec<_> = report.notes.iter().map(|n| n.reason.clone()).collect();
        assert_eq!(reasons, vec![SkipReason::Binary, SkipReason::Deleted]);
    }

    #[test]
    fn zero_cap_disables_hunk_limit() {
        let filter = FileFilter::new(&[], &[], 0).unwrap();
        let mut report = RunReport::default();
        let kept = filter.apply(vec![file("a.rs", vec![hunk("a.rs", 5000)])], &mut report);
        assert_eq!(kept.len(), 1);
        assert!(report.is_clean());
    }

    #[test]
    fn malformed_pattern_fails_construction() {
        let err = FileFilter::new(&patterns(&["src/[unclosed"]), &[], 0).unwrap_err();
        assert!(err.to_string().contains("invalid exclude pattern"), "got: {err}");
    }
}
