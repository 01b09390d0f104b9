//! Diff engine: acquisition, normalization, filtering and chunk planning.

pub mod chunker;
pub mod file;
pub mod filter;
pub mod git;
pub mod parser;

use std::path::Path;
use thiserror::Error;

use crate::models::InputMode;

pub use chunker::{ReviewChunk, plan_chunks};
pub use filter::{FileFilter, FilterError};
pub use parser::{NormalizedDiff, normalize, render};

/// Errors from the diff engine.
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("git command failed: {0}")]
    GitError(String),

    #[error("failed to read diff: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("malformed hunk header: {0}")]
    MalformedHunk(String),

    #[error("path not found: {0}")]
    PathNotFound(String),
}

/// Read a unified diff from stdin.
pub async fn read_diff_stdin() -> Result<String, DiffError> {
    use tokio::io::AsyncReadExt;
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .map_err(DiffError::FileReadError)?;
    Ok(buf)
}

/// Fetch the raw unified diff text for the given input mode.
///
/// Normalization is left to the caller so parse failures can be recorded
/// per file in the run report.
pub async fn read_raw_diff(input: &InputMode, repo_root: &Path) -> Result<String, DiffError> {
    match input {
        InputMode::DiffFile(path) => file::read_diff_file(path).await,
        InputMode::Stdin => read_diff_stdin().await,
        InputMode::GitRange { base, head } => git::git_diff(repo_root, base, head).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_raw_diff_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let diff_path = dir.path().join("change.diff");
        std::fs::write(
            &diff_path,
            "diff --git a/f.rs b/f.rs\nindex 111..222 100644\n--- a/f.rs\n+++ b/f.rs\n@@ -1,1 +1,1 @@\n-old\n+new\n",
        )
        .unwrap();

        let raw = read_raw_diff(&InputMode::DiffFile(diff_path), dir.path())
            .await
            .unwrap();
        let diff = normalize(&raw);
        assert_eq!(diff.files.len(), 1);
        assert_eq!(diff.files[0].new_path, "f.rs");
    }

    #[tokio::test]
    async fn read_raw_diff_missing_file() {
        let input = InputMode::DiffFile(std::path::PathBuf::from("/tmp/critic_nonexistent.diff"));
        let result = read_raw_diff(&input, Path::new("/tmp")).await;
        assert!(matches!(result, Err(DiffError::PathNotFound(_))));
    }
}
