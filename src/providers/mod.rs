//! Generative-text backend abstraction and the retrying review client.
//!
//! [`ReviewBackend`] is the "submit text, receive text" capability;
//! [`ReviewClient`] wraps a backend with the per-call timeout, the retry
//! policy and cancellation.

pub mod client;
pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::ReviewRequest;

pub use client::{RetryPolicy, ReviewClient};

/// Classified backend failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("cancelled")]
    Cancelled,
}

impl BackendError {
    /// Short label for logs and the run report.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Timeout(_) => "timeout",
            BackendError::RateLimited(_) => "rate limited",
            BackendError::ServerError(_) => "server error",
            BackendError::InvalidCredential(_) => "invalid credential",
            BackendError::Request(_) => "request error",
            BackendError::Cancelled => "cancelled",
        }
    }
}

/// A model that turns a review request into raw text.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    async fn complete(&self, model: &str, request: &ReviewRequest) -> Result<String, BackendError>;
}
