//! Prompt construction for a single review chunk.
//!
//! The system part is the mode's instruction template (embedded via
//! `include_str!` so it ships with the binary) followed by the shared
//! output contract. The user part lists each hunk with a new-side line
//! number gutter so the model can cite exact coordinates.

use indexmap::IndexMap;

use crate::diff::ReviewChunk;
use crate::models::ReviewMode;
use crate::models::diff::{Hunk, LineOrigin};
use crate::response::ReviewEnvelope;

const STANDARD_MD: &str = include_str!("modes/standard.md");
const STRICT_MD: &str = include_str!("modes/strict.md");
const LENIENT_MD: &str = include_str!("modes/lenient.md");
const SECURITY_MD: &str = include_str!("modes/security.md");
const PERFORMANCE_MD: &str = include_str!("modes/performance.md");

/// Opening marker around the structured block in model responses.
pub const REVIEW_OPEN: &str = "<review>";
/// Closing marker around the structured block in model responses.
pub const REVIEW_CLOSE: &str = "</review>";

/// Width of the new-line-number gutter.
const GUTTER_WIDTH: usize = 6;

/// A fully rendered model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub system: String,
    pub user: String,
}

/// Instruction template for a review mode.
pub fn mode_template(mode: ReviewMode) -> &'static str {
    match mode {
        ReviewMode::Standard => STANDARD_MD,
        ReviewMode::Strict => STRICT_MD,
        ReviewMode::Lenient => LENIENT_MD,
        ReviewMode::Security => SECURITY_MD,
        ReviewMode::Performance => PERFORMANCE_MD,
    }
}

/// Builds [`ReviewRequest`]s for chunks.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    /// Line budget; oversized chunks are cut to this many lines.
    max_chunk_lines: usize,
    /// Natural language for explanations, if not English.
    language: Option<String>,
    contract: String,
}

impl PromptBuilder {
    pub fn new(max_chunk_lines: usize, language: Option<String>) -> Self {
        Self {
            max_chunk_lines: max_chunk_lines.max(1),
            language: language.filter(|l| !l.trim().is_empty()),
            contract: output_contract(),
        }
    }

    pub fn build(&self, chunk: &ReviewChunk, mode: ReviewMode) -> ReviewRequest {
        let mut system = String::new();
        system.push_str(mode_template(mode).trim_end());
        system.push_str("\n\n");
        system.push_str(&self.contract);
        if let Some(ref language) = self.language {
            system.push_str(&format!(
                "\nWrite every `explanation` and suggestion `description` in {language}. \
                 Keep code, file paths and JSON keys unchanged.\n"
            ));
        }

        ReviewRequest {
            system,
            user: self.render_chunk(chunk),
        }
    }

    fn render_chunk(&self, chunk: &ReviewChunk) -> String {
        let mut by_file: IndexMap<&str, Vec<&Hunk>> = IndexMap::new();
        for hunk in &chunk.hunks {
            by_file.entry(hunk.file.as_str()).or_default().push(hunk);
        }

        let mut user = String::from(
            "Review the following changes. Each line shows its new-file line number \
             (blank for removed lines), the diff marker, then the code.\n\n",
        );
        let mut budget = self.max_chunk_lines;

        for (file, hunks) in by_file {
            user.push_str(&format!("## File: {file}\n\n```diff\n"));
            for hunk in hunks {
                user.push_str(&hunk.header_line());
                user.push('\n');
                let shown = hunk.len().min(budget);
                for line in &hunk.lines[..shown] {
                    let gutter = match (line.origin, line.new_line_no) {
                        (LineOrigin::Removed, _) | (_, None) => String::new(),
                        (_, Some(n)) => n.to_string(),
                    };
                    user.push_str(&format!(
                        "{gutter:>width$} {}{}\n",
                        line.origin.prefix(),
                        line.content,
                        width = GUTTER_WIDTH
                    ));
                }
                budget -= shown;
                if shown < hunk.len() {
                    let last = hunk.lines[..shown]
                        .iter()
                        .rev()
                        .find_map(|l| l.new_line_no)
                        .unwrap_or(hunk.new_start);
                    user.push_str("```\n\n");
                    user.push_str(&format!(
                        "NOTE: this hunk was truncated. Only the first {shown} of {} lines are \
                         shown. Do not report findings after line {last}.\n\n",
                        hunk.len()
                    ));
                    return user;
                }
            }
            user.push_str("```\n\n");
        }

        user
    }
}

/// Mode-independent response format instructions with the JSON schema.
fn output_contract() -> String {
    let schema = schemars::schema_for!(ReviewEnvelope);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    format!(
        "## Response format\n\n\
         Respond with a single JSON object of the form {{\"findings\": [...]}} placed \
         between {REVIEW_OPEN} and {REVIEW_CLOSE} markers. Nothing outside the markers is read.\n\n\
         Each finding has:\n\
         - \"file\": the file path exactly as shown after \"## File:\"\n\
         - \"line\": the new-file line number from the gutter; it must be an added (+) or \
         unchanged line, never a removed (-) one\n\
         - \"end_line\": (optional) last line of a multi-line range, within the same hunk\n\
         - \"severity\": one of \"critical\", \"high\", \"medium\", \"low\"\n\
         - \"category\": short focus area, e.g. \"bug\", \"security\", \"performance\", \"style\"\n\
         - \"explanation\": what is wrong and why it matters\n\
         - \"confidence\": (optional) number between 0.0 and 1.0\n\
         - \"suggestions\": list of {{\"description\", \"before\", \"after\"}} code changes; \
         \"before\" is the exact code being replaced (omit for pure insertions) and \"after\" \
         is the complete replacement for the lines from \"line\" to \"end_line\"\n\n\
         If there is nothing to report, answer {REVIEW_OPEN}{{\"findings\": []}}{REVIEW_CLOSE}.\n\n\
         JSON schema:\n\n```json\n{schema}\n```\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::diff::DiffLine;
    use strum::IntoEnumIterator;

    fn sample_hunk(file: &str) -> Hunk {
        Hunk {
            file: file.into(),
            old_start: 10,
            old_count: 3,
            new_start: 10,
            new_count: 3,
            header: Some("fn handler()".into()),
            lines: vec![
                DiffLine::context("let id = req.id();", 10, 10),
                DiffLine::removed("let q = format!(\"{id}\");", 11),
                DiffLine::added("let q = query(id);", 11),
                DiffLine::context("run(q)", 12, 12),
            ],
        }
    }

    fn chunk(hunks: Vec<Hunk>, oversized: bool) -> ReviewChunk {
        ReviewChunk {
            index: 0,
            line_count: hunks.iter().map(Hunk::len).sum(),
            hunks,
            oversized,
        }
    }

    #[test]
    fn every_mode_has_a_distinct_template() {
        let templates: Vec<&str> = ReviewMode::iter().map(mode_template).collect();
        for (i, a) in templates.iter().enumerate() {
            assert!(!a.trim().is_empty());
            for b in &templates[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn system_prompt_carries_mode_and_contract() {
        let builder = PromptBuilder::new(500, None);
        let req = builder.build(&chunk(vec![sample_hunk("src/api.rs")], false), ReviewMode::Security);
        assert!(req.system.starts_with(SECURITY_MD.trim_end()));
        assert!(req.system.contains(REVIEW_OPEN));
        assert!(req.system.contains("\"findings\""));
        assert!(req.system.contains("\"explanation\""));
        assert!(!req.system.contains("Write every"));
    }

    #[test]
    fn user_prompt_has_new_line_gutter() {
        let builder = PromptBuilder::new(500, None);
        let req = builder.build(&chunk(vec![sample_hunk("src/api.rs")], false), ReviewMode::Standard);
        assert!(req.user.contains("## File: src/api.rs"));
        assert!(req.user.contains("@@ -10,3 +10,3 @@ fn handler()"));
        assert!(req.user.contains("    10  let id = req.id();"));
        assert!(req.user.contains("       -let q = format!"));
        assert!(req.user.contains("    11 +let q = query(id);"));
        assert!(req.user.contains("    12  run(q)"));
    }

    #[test]
    fn hunks_grouped_under_their_file() {
        let builder = PromptBuilder::new(500, None);
        let hunks = vec![sample_hunk("a.rs"), sample_hunk("a.rs"), sample_hunk("b.rs")];
        let req = builder.build(&chunk(hunks, false), ReviewMode::Standard);
        assert_eq!(req.user.matches("## File: a.rs").count(), 1);
        assert_eq!(req.user.matches("## File: b.rs").count(), 1);
        assert_eq!(req.user.matches("@@ -10,3").count(), 3);
    }

    #[test]
    fn oversized_chunk_is_truncated_with_notice() {
        let lines = (0..20)
            .map(|i| DiffLine::added(format!("x{i}"), 100 + i))
            .collect();
        let hunk = Hunk {
            file: "big.rs".into(),
            old_start: 99,
            old_count: 0,
            new_start: 100,
            new_count: 20,
            header: None,
            lines,
        };
        let builder = PromptBuilder::new(5, None);
        let req = builder.build(&chunk(vec![hunk], true), ReviewMode::Standard);
        assert!(req.user.contains("x4\n"));
        assert!(!req.user.contains("x5\n"));
        assert!(req.user.contains("first 5 of 20 lines"));
        assert!(req.user.contains("after line 104"));
    }

    #[test]
    fn language_instruction_appended() {
        let builder = PromptBuilder::new(500, Some("Korean".into()));
        let req = builder.build(&chunk(vec![sample_hunk("a.rs")], false), ReviewMode::Lenient);
        assert!(req.system.contains("in Korean"));
    }

    #[test]
    fn blank_language_is_ignored() {
        let builder = PromptBuilder::new(500, Some("  ".into()));
        let req = builder.build(&chunk(vec![sample_hunk("a.rs")], false), ReviewMode::Lenient);
        assert!(!req.system.contains("Write every"));
    }
}
