//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.critic.toml` in repo root
//! 4. `~/.config/critic/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants;
use crate::env::Env;
use crate::models::{ProviderName, ReviewMode};
use crate::providers::RetryPolicy;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub review: ReviewConfig,
    pub provider: ProviderConfig,
    pub github: GithubConfig,
}

/// Review-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub mode: ReviewMode,
    /// Gitignore-style patterns; matching files are not reviewed.
    pub exclude: Vec<String>,
    /// When non-empty, only matching files are reviewed.
    pub include: Vec<String>,
    /// Files beyond this many are skipped (0 = unlimited).
    pub max_files: usize,
    /// Hunks longer than this are skipped (0 = unlimited).
    pub max_lines_per_hunk: usize,
    pub max_lines_per_chunk: usize,
    pub max_concurrent: usize,
    /// Findings reporting a lower confidence are dropped.
    pub min_confidence: f32,
    /// Natural language for explanations, e.g. "Japanese".
    pub language: Option<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            mode: ReviewMode::Standard,
            exclude: Vec::new(),
            include: Vec::new(),
            max_files: 50,
            max_lines_per_hunk: 1000,
            max_lines_per_chunk: 500,
            max_concurrent: 4,
            min_confidence: 0.0,
            language: None,
        }
    }
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Total calls per chunk, including the first.
    pub max_attempts: u32,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Gemini,
            model: "gemini-2.5-flash".to_string(),
            base_url: None,
            api_key: None,
            timeout_secs: 120,
            max_attempts: 4,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            ..RetryPolicy::default()
        }
    }
}

/// GitHub publishing target.
///
/// The token is never read from or written to config files.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    #[serde(skip)]
    pub token: Option<String>,
    /// `owner/name`.
    pub repository: Option<String>,
    pub pr_number: Option<u64>,
    /// Head commit the comments are attached to.
    pub commit: Option<String>,
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("repository", &self.repository)
            .field("pr_number", &self.pr_number)
            .field("commit", &self.commit)
            .finish()
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_GITHUB_API_URL.to_string(),
            token: None,
            repository: None,
            pr_number: None,
            commit: None,
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, repo-local config, then applies
    /// environment variable overrides.
    pub fn load(repo_root: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        if let Some(root) = repo_root {
            let local_path = root.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        let review = ReviewConfig::default();
        if other.review.mode != review.mode {
            self.review.mode = other.review.mode;
        }
        if !other.review.exclude.is_empty() {
            self.review.exclude = other.review.exclude;
        }
        if !other.review.include.is_empty() {
            self.review.include = other.review.include;
        }
        if other.review.max_files != review.max_files {
            self.review.max_files = other.review.max_files;
        }
        if other.review.max_lines_per_hunk != review.max_lines_per_hunk {
            self.review.max_lines_per_hunk = other.review.max_lines_per_hunk;
        }
        if other.review.max_lines_per_chunk != review.max_lines_per_chunk {
            self.review.max_lines_per_chunk = other.review.max_lines_per_chunk;
        }
        if other.review.max_concurrent != review.max_concurrent {
            self.review.max_concurrent = other.review.max_concurrent;
        }
        if other.review.min_confidence != review.min_confidence {
            self.review.min_confidence = other.review.min_confidence;
        }
        if other.review.language.is_some() {
            self.review.language = other.review.language;
        }

        let provider = ProviderConfig::default();
        if other.provider.name != provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }
        if other.provider.timeout_secs != provider.timeout_secs {
            self.provider.timeout_secs = other.provider.timeout_secs;
        }
        if other.provider.max_attempts != provider.max_attempts {
            self.provider.max_attempts = other.provider.max_attempts;
        }

        if other.github.api_url != constants::DEFAULT_GITHUB_API_URL {
            self.github.api_url = other.github.api_url;
        }
        if other.github.repository.is_some() {
            self.github.repository = other.github.repository;
        }
        if other.github.pr_number.is_some() {
            self.github.pr_number = other.github.pr_number;
        }
        if other.github.commit.is_some() {
            self.github.commit = other.github.commit;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.value(constants::ENV_PROVIDER) {
            match ProviderName::parse(&val) {
                Ok(name) => self.provider.name = name,
                Err(e) => tracing::warn!("ignoring {}: {e}", constants::ENV_PROVIDER),
            }
        }
        if let Some(val) = env.value(constants::ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.value(constants::ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env
            .value(constants::ENV_API_KEY)
            .or_else(|| env.value(self.provider.name.api_key_env_var()));
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        if let Some(val) = env.value(constants::ENV_MODE) {
            match val.parse::<ReviewMode>() {
                Ok(mode) => self.review.mode = mode,
                Err(_) => tracing::warn!("ignoring invalid {} value: {val}", constants::ENV_MODE),
            }
        }
        if let Some(patterns) = env.list(constants::ENV_EXCLUDE) {
            self.review.exclude = patterns;
        }
        if let Some(val) = env.value(constants::ENV_LANGUAGE) {
            self.review.language = Some(val);
        }

        self.github.token = env.value(constants::ENV_GITHUB_TOKEN);
        if let Some(val) = env.value(constants::ENV_GITHUB_API_URL) {
            self.github.api_url = val;
        }
        if let Some(val) = env.value(constants::ENV_GITHUB_REPOSITORY) {
            self.github.repository = Some(val);
        }
        if let Some(val) = env.value(constants::ENV_GITHUB_SHA) {
            self.github.commit = Some(val);
        }
        if let Some(val) = env.value(constants::ENV_PR_NUMBER) {
            match val.parse::<u64>() {
                Ok(n) => self.github.pr_number = Some(n),
                Err(_) => {
                    tracing::warn!("ignoring invalid {} value: {val}", constants::ENV_PR_NUMBER)
                }
            }
        }
    }
}
