//! Git CLI wrapper for acquiring diffs.
//!
//! Shells out to `git` via `tokio::process::Command`.

use std::path::Path;

use super::DiffError;

/// Run a git subcommand in `dir` and return its stdout.
async fn run_git(dir: &Path, args: &[&str]) -> Result<String, DiffError> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| DiffError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DiffError::GitError(format!(
            "git {} failed (exit {}): {}",
            args.first().copied().unwrap_or_default(),
            output.status,
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout)
        .map_err(|e| DiffError::GitError(format!("git output is not valid UTF-8: {e}")))
}

/// Diff `head` against its merge base with `base` (`git diff base...head`).
///
/// Prefixes are forced to `a/`/`b/` so user-level `diff.mnemonicPrefix`
/// or `diff.noprefix` settings don't change the header shape.
pub async fn git_diff(repo_root: &Path, base: &str, head: &str) -> Result<String, DiffError> {
    let range = format!("{base}...{head}");
    tracing::debug!(%range, "running git diff");
    run_git(
        repo_root,
        &["diff", "--no-color", "--src-prefix=a/", "--dst-prefix=b/", &range],
    )
    .await
}

/// Resolve a revision to its full commit SHA.
pub async fn resolve_commit(repo_root: &Path, rev: &str) -> Result<String, DiffError> {
    let sha = run_git(repo_root, &["rev-parse", "--verify", rev]).await?;
    Ok(sha.trim().to_string())
}

/// Find the root of the git repository containing `start_dir`.
pub async fn find_repo_root(start_dir: &Path) -> Result<String, DiffError> {
    run_git(start_dir, &["rev-parse", "--show-toplevel"])
        .await
        .map(|out| out.trim().to_string())
        .map_err(|e| DiffError::GitError(format!("not a git repository: {e}")))
}
