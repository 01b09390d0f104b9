//! Run-level summary comment.

use std::fmt::Write;

use crate::constants::{APP_NAME, SUMMARY_MARKER};
use crate::models::{ReviewMode, RunReport, SkipNote};

/// Notes listed per section before the rest are elided.
const MAX_LISTED: usize = 100;

/// Render the Markdown summary posted once at the end of every run.
pub fn render_summary(report: &RunReport, mode: ReviewMode, model: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{SUMMARY_MARKER}");
    let _ = writeln!(out, "### {APP_NAME} review summary\n");
    let _ = writeln!(out, "Mode `{mode}` · model `{model}`\n");

    let _ = writeln!(out, "| | |\n|---|---|");
    let _ = writeln!(out, "| Files reviewed | {} |", report.files_reviewed);
    let _ = writeln!(
        out,
        "| Chunks reviewed | {} of {} |",
        report.chunks_reviewed, report.chunks_planned
    );
    let _ = writeln!(
        out,
        "| Findings | {} parsed, {} anchored |",
        report.findings_parsed, report.findings_anchored
    );
    let _ = writeln!(
        out,
        "| Comments | {} posted, {} already present |",
        report.comments_posted, report.comments_duplicate
    );
    if let Some(breakdown) = report.severity_breakdown() {
        let _ = writeln!(out, "| By severity | {breakdown} |");
    }

    if report.cancelled {
        let _ = writeln!(
            out,
            "\n⚠️ The run was cancelled. Only completed chunks were published."
        );
    }

    let (notes, failures): (Vec<&SkipNote>, Vec<&SkipNote>) =
        report.notes.iter().partition(|n| n.reason.is_informational());

    if report.notes.is_empty() {
        let _ = writeln!(out, "\nEvery file in the diff was reviewed.");
    }
    write_section(&mut out, "Skipped or failed", &failures);
    write_section(&mut out, "Notes", &notes);

    out.trim_end().to_string()
}

fn write_section(out: &mut String, title: &str, notes: &[&SkipNote]) {
    if notes.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n<details><summary>{title} ({})</summary>\n", notes.len());
    for note in notes.iter().take(MAX_LISTED) {
        let _ = writeln!(out, "- {note}");
    }
    if notes.len() > MAX_LISTED {
        let _ = writeln!(out, "- … and {} more", notes.len() - MAX_LISTED);
    }
    let _ = writeln!(out, "\n</details>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, SkipReason, Subject};

    fn report() -> RunReport {
        RunReport {
            comments_by_severity: [(Severity::High, 2), (Severity::Low, 1)].into(),
            files_reviewed: 2,
            chunks_planned: 3,
            chunks_reviewed: 2,
            findings_parsed: 5,
            findings_anchored: 4,
            comments_posted: 3,
            comments_duplicate: 1,
            ..RunReport::default()
        }
    }

    #[test]
    fn clean_run() {
        let text = render_summary(&report(), ReviewMode::Standard, "gemini-2.5-flash");
        assert!(text.starts_with(SUMMARY_MARKER));
        assert!(text.contains("Mode `standard` · model `gemini-2.5-flash`"));
        assert!(text.contains("| Chunks reviewed | 2 of 3 |"));
        assert!(text.contains("| Comments | 3 posted, 1 already present |"));
        assert!(text.contains("| By severity | 2 high, 1 low |"));
        assert!(text.contains("Every file in the diff was reviewed."));
        assert!(!text.contains("cancelled"));
    }

    #[test]
    fn notes_are_split_by_kind() {
        let mut report = report();
        report.record(SkipNote::file("docs/a.md", SkipReason::Excluded));
        report.record(SkipNote::new(
            Subject::Chunk {
                index: 1,
                files: vec!["src/b.rs".into()],
            },
            SkipReason::ReviewFailed("rate limited: 429".into()),
        ));
        report.cancelled = true;

        let text = render_summary(&report, ReviewMode::Security, "m");
        assert!(text.contains("<summary>Skipped or failed (1)</summary>"));
        assert!(text.contains("- chunk #2 (src/b.rs): skipped: review failed (rate limited: 429)"));
        assert!(text.contains("<summary>Notes (1)</summary>"));
        assert!(text.contains("- `docs/a.md`: skipped: excluded by pattern"));
        assert!(text.contains("The run was cancelled"));
        assert!(!text.contains("Every file in the diff was reviewed."));
    }

    #[test]
    fn severity_row_omitted_without_comments() {
        let report = RunReport::default();
        let text = render_summary(&report, ReviewMode::Standard, "m");
        assert!(!text.contains("By severity"));
    }

    #[test]
    fn long_lists_are_elided() {
        let mut report = report();
        for i in 0..(MAX_LISTED + 5) {
            report.record(SkipNote::file(format!("f{i}.bin"), SkipReason::Binary));
        }
        let text = render_summary(&report, ReviewMode::Standard, "m");
        assert!(text.contains("- … and 5 more"));
    }
}
