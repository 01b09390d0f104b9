//! Dry-run publisher printing comments as JSON lines.
//!
//! Each comment becomes one `{"kind": ..., ...}` object per line so the
//! output can be piped into `jq` or inspected in CI logs.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChangeRequestApi, ExistingComment, GeneralComment, NewComment, PublishError};

pub struct StdoutApi<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
}

impl StdoutApi {
    pub fn new() -> Self {
        Self::with_writer(std::io::stdout())
    }
}

impl Default for StdoutApi {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdoutApi<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, value: serde_json::Value) -> Result<(), PublishError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| PublishError::Transport("output lock poisoned".to_string()))?;
        writeln!(out, "{value}")
            .and_then(|()| out.flush())
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

#[async_trait]
impl<W: Write + Send> ChangeRequestApi for StdoutApi<W> {
    async fn list_comments(&self) -> Result<Vec<ExistingComment>, PublishError> {
        Ok(Vec::new())
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<(), PublishError> {
        self.emit(serde_json::json!({
            "kind": "review_comment",
            "path": comment.file,
            "line": comment.line,
            "end_line": comment.end_line,
            "body": comment.body,
        }))
    }

    async fn list_general_comments(&self) -> Result<Vec<GeneralComment>, PublishError> {
        Ok(Vec::new())
    }

    async fn create_general_comment(&self, body: &str) -> Result<(), PublishError> {
        self.emit(serde_json::json!({
            "kind": "general_comment",
            "body": body,
        }))
    }

    async fn update_general_comment(&self, id: u64, body: &str) -> Result<(), PublishError> {
        self.emit(serde_json::json!({
            "kind": "general_comment_update",
            "id": id,
            "body": body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_one_json_object_per_comment() {
        let api = StdoutApi::with_writer(Vec::new());
        api.create_comment(&NewComment {
            file: "src/a.rs".into(),
            line: 3,
            end_line: Some(5),
            body: "multi\nline".into(),
        })
        .await
        .unwrap();
        api.create_general_comment("summary").await.unwrap();

        let output = String::from_utf8(api.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "review_comment");
        assert_eq!(lines[0]["path"], "src/a.rs");
        assert_eq!(lines[0]["end_line"], 5);
        assert_eq!(lines[0]["body"], "multi\nline");
        assert_eq!(lines[1]["kind"], "general_comment");
    }

    #[tokio::test]
    async fn dry_run_has_no_existing_comments() {
        let api = StdoutApi::with_writer(Vec::new());
        assert!(api.list_comments().await.unwrap().is_empty());
        assert!(api.list_general_comments().await.unwrap().is_empty());
    }
}
