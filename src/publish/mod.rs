//! Comment publishing with deduplication and per-finding failure isolation.
//!
//! The publisher is seeded with the change request's existing comments.
//! Every anchored finding is keyed by `(file, line, body hash)`; a key is
//! reserved before posting and released if the post fails, so concurrent
//! chunk workers never post the same comment twice and a rerun over the
//! same diff posts nothing new. The run summary is found again by its
//! hidden marker and edited in place.

pub mod body;
pub mod github;
pub mod stdout;
pub mod summary;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::anchor::AnchoredFinding;
use crate::constants::SUMMARY_MARKER;

pub use github::GithubApi;
pub use stdout::StdoutApi;
pub use summary::render_summary;

/// Errors from the change-request comment API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("permission denied: {0}")]
    Permission(String),

    #[error("anchor no longer valid: {0}")]
    StaleAnchor(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("missing publishing setting: {0}")]
    MissingSetting(String),
}

/// A line comment already present on the change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingComment {
    pub file: String,
    /// First new-side line the comment is attached to.
    pub line: u32,
    pub body: String,
}

/// A line comment to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub file: String,
    pub line: u32,
    /// Last line of a multi-line comment.
    pub end_line: Option<u32>,
    pub body: String,
}

/// A comment on the change request itself rather than on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralComment {
    pub id: u64,
    pub body: String,
}

/// The operations needed from a code host's change request.
#[async_trait]
pub trait ChangeRequestApi: Send + Sync {
    async fn list_comments(&self) -> Result<Vec<ExistingComment>, PublishError>;

    async fn create_comment(&self, comment: &NewComment) -> Result<(), PublishError>;

    async fn list_general_comments(&self) -> Result<Vec<GeneralComment>, PublishError>;

    /// Post a comment on the change request itself, not on a line.
    async fn create_general_comment(&self, body: &str) -> Result<(), PublishError>;

    async fn update_general_comment(&self, id: u64, body: &str) -> Result<(), PublishError>;
}

/// Identity of a comment for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub file: String,
    pub line: u32,
    pub hash: String,
}

impl DedupKey {
    fn of_existing(comment: &ExistingComment) -> Self {
        Self {
            file: comment.file.clone(),
            line: comment.line,
            hash: body::dedup_hash(&comment.body),
        }
    }
}

/// Keys of comments that exist or are being posted in this run.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    keys: Mutex<HashSet<DedupKey>>,
}

impl DedupRegistry {
    pub async fn seed(&self, existing: &[ExistingComment]) {
        let mut keys = self.keys.lock().await;
        keys.extend(existing.iter().map(DedupKey::of_existing));
    }

    /// Claim `key`; returns `false` if it is already taken.
    pub async fn reserve(&self, key: &DedupKey) -> bool {
        self.keys.lock().await.insert(key.clone())
    }

    pub async fn release(&self, key: &DedupKey) {
        self.keys.lock().await.remove(key);
    }
}

/// Result of publishing one finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Posted,
    Duplicate,
    Failed(PublishError),
}

/// Posts anchored findings to a change request, once each.
pub struct CommentPublisher {
    api: Arc<dyn ChangeRequestApi>,
    registry: DedupRegistry,
}

impl CommentPublisher {
    pub fn new(api: Arc<dyn ChangeRequestApi>) -> Self {
        Self {
            api,
            registry: DedupRegistry::default(),
        }
    }

    /// Load existing comments into the dedup registry.
    ///
    /// Returns how many comments were seen.
    pub async fn seed(&self) -> Result<usize, PublishError> {
        let existing = self.api.list_comments().await?;
        self.registry.seed(&existing).await;
        tracing::debug!(count = existing.len(), "seeded dedup registry");
        Ok(existing.len())
    }

    pub async fn publish(&self, item: &AnchoredFinding) -> PublishOutcome {
        let visible = body::render_body(&item.finding, &item.anchor);
        let hash = body::body_hash(&visible);
        let key = DedupKey {
            file: item.anchor.file.clone(),
            line: item.anchor.line,
            hash: hash.clone(),
        };

        if !self.registry.reserve(&key).await {
            tracing::debug!(file = %key.file, line = key.line, "comment already present");
            return PublishOutcome::Duplicate;
        }

        let comment = NewComment {
            file: item.anchor.file.clone(),
            line: item.anchor.line,
            end_line: item.anchor.end_line,
            body: body::with_marker(&visible, &hash),
        };
        match self.api.create_comment(&comment).await {
            Ok(()) => PublishOutcome::Posted,
            Err(err) => {
                self.registry.release(&key).await;
                tracing::warn!(file = %comment.file, line = comment.line, error = %err, "failed to post comment");
                PublishOutcome::Failed(err)
            }
        }
    }

    /// Post the run summary, replacing the one left by an earlier run.
    pub async fn publish_summary(&self, body: &str) -> Result<(), PublishError> {
        let previous = match self.api.list_general_comments().await {
            Ok(comments) => comments
                .into_iter()
                .rev()
                .find(|c| c.body.trim_start().starts_with(SUMMARY_MARKER)),
            Err(err) => {
                tracing::warn!(error = %err, "could not look up an earlier summary");
                None
            }
        };
        match previous {
            Some(comment) => {
                tracing::debug!(id = comment.id, "updating earlier summary");
                self.api.update_general_comment(comment.id, body).await
            }
            None => self.api.create_general_comment(body).await,
        }
    }
}
