//! Finding types representing review results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority of a finding, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Style or readability nit.
    Low,
    /// Should be addressed but does not block.
    Medium,
    /// Likely bug or notable risk.
    High,
    /// Must be fixed before merging.
    Critical,
}

/// Custom deserializer for Severity that accepts common LLM variations.
///
/// Models answer with "error", "warning", "info" or "minor" as often as
/// with the requested priority labels. This normalizes them.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::from_label(&s))
    }
}

impl Severity {
    /// Every level, highest first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Map a free-form priority label onto a severity, defaulting to medium.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" | "blocker" | "fatal" | "severe" => Severity::Critical,
            "high" | "error" | "major" => Severity::High,
            "low" | "info" | "note" | "suggestion" | "minor" | "trivial" | "style" | "nit" => {
                Severity::Low
            }
            _ => Severity::Medium,
        }
    }

    /// Emoji marker used in comment bodies.
    pub fn marker(self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::High => "🔴",
            Severity::Medium => "🟡",
            Severity::Low => "🔵",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A before/after code change proposed alongside a finding.
///
/// `after` is always present; a missing `before` means the change is a
/// pure insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Suggestion {
    /// What the change does.
    pub description: String,
    /// The code being replaced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// The replacement code.
    pub after: String,
}

impl Suggestion {
    pub fn is_insertion(&self) -> bool {
        self.before.is_none()
    }
}

/// A single review comment's content before it is anchored to the diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    /// The file path relative to the repo root.
    pub file: String,
    /// The new-side line number (1-based).
    pub line: u32,
    /// The ending line number (1-based, inclusive). May equal `line`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// The severity of the finding.
    pub severity: Severity,
    /// Free-form focus area reported by the model (e.g. "security").
    pub category: String,
    /// Detailed explanation of the issue.
    pub explanation: String,
    /// Model-reported confidence in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Proposed code changes, possibly empty.
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_display() {
        let labels: Vec<String> = Severity::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(labels, ["critical", "high", "medium", "low"]);
    }

    #[test]
    fn severity_accepts_priority_labels() {
        let parsed: Vec<Severity> = serde_json::from_str(
            r#"["critical", "high", "medium", "low", "Error", "warning", "info", "bogus"]"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                Severity::Critical,
                Severity::High,
                Severity::Medium,
                Severity::Low,
                Severity::High,
                Severity::Medium,
                Severity::Low,
                Severity::Medium,
            ]
        );
    }

    #[test]
    fn suggestion_without_before_is_insertion() {
        let s = Suggestion {
            description: "add guard".into(),
            before: None,
            after: "if x.is_none() { return; }".into(),
        };
        assert!(s.is_insertion());
    }
}
