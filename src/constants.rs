//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and URLs so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "critic";

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compilation target triple, exported by `build.rs`.
pub const TARGET: &str = env!("TARGET");

/// Local config filename (e.g. `.critic.toml` in repo root).
pub const CONFIG_FILENAME: &str = ".critic.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "critic";

/// User agent for GitHub API requests.
pub const USER_AGENT: &str = concat!("critic/", env!("CARGO_PKG_VERSION"));

/// Default GitHub REST API endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Prefix of the hidden marker embedded in every posted comment body.
pub const COMMENT_MARKER_PREFIX: &str = "<!-- critic:";

/// Hidden marker identifying the run summary comment.
pub const SUMMARY_MARKER: &str = "<!-- critic:summary -->";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "CRITIC_PROVIDER";
pub const ENV_MODEL: &str = "CRITIC_MODEL";
pub const ENV_API_KEY: &str = "CRITIC_API_KEY";
pub const ENV_BASE_URL: &str = "CRITIC_BASE_URL";
pub const ENV_MODE: &str = "CRITIC_MODE";
pub const ENV_EXCLUDE: &str = "CRITIC_EXCLUDE";
pub const ENV_LANGUAGE: &str = "CRITIC_LANGUAGE";
pub const ENV_LOG: &str = "CRITIC_LOG";

pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const ENV_GITHUB_SHA: &str = "GITHUB_SHA";
pub const ENV_GITHUB_API_URL: &str = "GITHUB_API_URL";
pub const ENV_PR_NUMBER: &str = "PR_NUMBER";
