//! Clap argument types, validation, and config overrides.

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use critic::config::Config;
use critic::models::ReviewMode;

/// AI-assisted pull request reviewer.
#[derive(Parser, Debug)]
#[command(
    name = "critic",
    version = critic::constants::VERSION,
    about = super::ABOUT_STYLED,
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). Overridden by CRITIC_LOG.
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Review a diff and publish line comments.
    Review(Box<ReviewArgs>),

    /// List available review modes.
    Modes,

    /// Print version and build information.
    Version,
}

/// Where review comments go.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum PublishTarget {
    /// Post to the GitHub pull request.
    Github,
    /// Print comments as JSON lines (dry run).
    #[default]
    Stdout,
}

/// Arguments for the `review` subcommand.
#[derive(Parser, Debug, Default)]
pub struct ReviewArgs {
    // --- Repo location ---
    /// Path to the repository or working directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    // --- Input (one required) ---
    /// Base revision; diffs `base...head` with git.
    #[arg(long)]
    pub base: Option<String>,

    /// Head revision for --base.
    #[arg(long, requires = "base")]
    pub head: Option<String>,

    /// Pre-computed unified diff file.
    #[arg(long)]
    pub diff_file: Option<PathBuf>,

    /// Read unified diff from stdin.
    #[arg(long, default_value_t = false)]
    pub diff_stdin: bool,

    // --- Output ---
    /// Where to publish comments.
    #[arg(long, default_value = "stdout")]
    pub publish: PublishTarget,

    // --- Review ---
    /// Review mode (see `critic modes`).
    #[arg(long)]
    pub mode: Option<ReviewMode>,

    /// Comma-separated exclude patterns (gitignore syntax). Replaces configured patterns.
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Comma-separated include patterns; only matching files are reviewed.
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Max files per review (0 = unlimited).
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Hunks longer than this are skipped (0 = unlimited).
    #[arg(long)]
    pub max_lines_per_hunk: Option<usize>,

    /// Diff lines sent per model request.
    #[arg(long)]
    pub max_lines_per_chunk: Option<usize>,

    /// Max concurrent model requests.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Model identifier.
    #[arg(long)]
    pub model: Option<String>,

    // --- GitHub ---
    /// Repository as `owner/name` (default: GITHUB_REPOSITORY).
    #[arg(long)]
    pub repo: Option<String>,

    /// Pull request number (default: PR_NUMBER).
    #[arg(long)]
    pub pr: Option<u64>,

    /// Head commit SHA comments attach to (default: GITHUB_SHA).
    #[arg(long)]
    pub commit: Option<String>,
}

impl ReviewArgs {
    /// Validate that exactly one input source is provided.
    pub fn validate_input(&self) -> Result<InputMode, String> {
        let sources = [self.diff_file.is_some(), self.diff_stdin, self.base.is_some()];
        let count = sources.iter().filter(|&&x| x).count();

        if count == 0 {
            return Err(
                "one input source is required: --base, --diff-file, or --diff-stdin".to_string(),
            );
        }
        if count > 1 {
            return Err(
                "only one input source allowed: --base, --diff-file, or --diff-stdin".to_string(),
            );
        }

        if let Some(ref path) = self.diff_file {
            Ok(InputMode::DiffFile(path.clone()))
        } else if self.diff_stdin {
            Ok(InputMode::Stdin)
        } else {
            let base = self.base.clone().unwrap_or_default();
            let head = self.head.clone().unwrap_or_else(|| "HEAD".to_string());
            Ok(InputMode::GitRange { base, head })
        }
    }

    /// Apply flags on top of the loaded config (highest priority).
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.review.mode = mode;
        }
        if !self.exclude.is_empty() {
            config.review.exclude = self.exclude.clone();
        }
        if !self.include.is_empty() {
            config.review.include = self.include.clone();
        }
        if let Some(n) = self.max_files {
            config.review.max_files = n;
        }
        if let Some(n) = self.max_lines_per_hunk {
            config.review.max_lines_per_hunk = n;
        }
        if let Some(n) = self.max_lines_per_chunk {
            config.review.max_lines_per_chunk = n;
        }
        if let Some(n) = self.max_concurrent {
            config.review.max_concurrent = n;
        }
        if let Some(ref model) = self.model {
            config.provider.model = model.clone();
        }
        if let Some(ref repo) = self.repo {
            config.github.repository = Some(repo.clone());
        }
        if let Some(pr) = self.pr {
            config.github.pr_number = Some(pr);
        }
        if let Some(ref commit) = self.commit {
            config.github.commit = Some(commit.clone());
        }
    }
}

// InputMode is defined in models/ and re-exported here for convenience.
pub use critic::models::InputMode;
