//! Shared types used across all modules.
//!
//! This module defines the core data structures for diffs, findings,
//! review modes and the run report. Other modules import from here
//! rather than reaching into each other's internals.

pub mod diff;
pub mod finding;
pub mod report;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use diff::{DiffLine, FileDiff, Hunk, LineOrigin};
pub use finding::{Finding, Severity, Suggestion};
pub use report::{RunReport, SkipNote, SkipReason, Subject};

/// Where the raw unified diff comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    /// Read a pre-computed unified diff from a file.
    DiffFile(PathBuf),
    /// Read a unified diff from stdin.
    Stdin,
    /// Diff two revisions with git (`base...head`).
    GitRange { base: String, head: String },
}

/// Review focus selecting the instruction template.
///
/// Modes differ only in strictness and focus area; every mode shares the
/// same output schema and the same response parser.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ReviewMode {
    /// Balanced review of correctness, readability and maintainability.
    #[default]
    Standard,
    /// Flags every deviation from best practice, including style.
    Strict,
    /// Reports only clear bugs and significant risks.
    Lenient,
    /// Focuses on vulnerabilities and unsafe data handling.
    Security,
    /// Focuses on complexity, allocation and I/O hot spots.
    Performance,
}

impl ReviewMode {
    /// One-line description for `critic modes`.
    pub fn description(self) -> &'static str {
        match self {
            ReviewMode::Standard => "Balanced review of correctness, readability and maintainability",
            ReviewMode::Strict => "Flags every deviation from best practice, including style",
            ReviewMode::Lenient => "Reports only clear bugs and significant risks",
            ReviewMode::Security => "Focuses on vulnerabilities and unsafe data handling",
            ReviewMode::Performance => "Focuses on complexity, allocation and I/O hot spots",
        }
    }
}

/// Supported LLM provider backends.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderName {
    Anthropic,
    #[serde(rename = "openai")]
    #[strum(serialize = "openai")]
    OpenAI,
    Cohere,
    #[default]
    Gemini,
    Perplexity,
    #[serde(rename = "deepseek")]
    #[strum(serialize = "deepseek")]
    DeepSeek,
    #[serde(rename = "xai")]
    #[strum(serialize = "xai")]
    XAI,
    Groq,
    /// Any OpenAI-compatible API (e.g. Ollama, Together, local servers).
    #[serde(rename = "openai-compatible")]
    #[strum(serialize = "openai-compatible")]
    OpenAICompatible,
}

impl ProviderName {
    /// Returns the provider-specific environment variable name for the API key.
    ///
    /// These match the env var names used by rig-core's `from_env()` implementations.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "OPENAI_API_KEY",
            ProviderName::Cohere => "COHERE_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
            ProviderName::Perplexity => "PERPLEXITY_API_KEY",
            ProviderName::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderName::XAI => "XAI_API_KEY",
            ProviderName::Groq => "GROQ_API_KEY",
        }
    }

    /// Parse a provider name, listing the supported names on failure.
    pub fn parse(s: &str) -> Result<Self, String> {
        use strum::VariantNames;
        s.parse().map_err(|_| {
            format!(
                "unsupported provider: '{s}'. Supported: {}",
                ProviderName::VARIANTS.join(", ")
            )
        })
    }
}
