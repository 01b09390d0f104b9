//! GitHub pull request review comments via the REST API.
//!
//! Inside GitHub Actions the repository and head commit come from
//! `GITHUB_REPOSITORY` and `GITHUB_SHA`; the pull request number from
//! `PR_NUMBER` or `--pr`. The user only needs to supply `GITHUB_TOKEN`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ChangeRequestApi, ExistingComment, GeneralComment, NewComment, PublishError};
use crate::config::GithubConfig;
use crate::constants;

const PER_PAGE: usize = 100;

/// Upper bound on pages fetched when listing comments.
const MAX_PAGES: usize = 50;

/// An issue comment as returned by the list endpoint.
#[derive(Debug, Deserialize)]
struct IssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

/// A pull request review comment as returned by the list endpoint.
#[derive(Debug, Deserialize)]
struct ReviewComment {
    path: String,
    body: String,
    #[serde(default)]
    start_line: Option<u32>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    original_start_line: Option<u32>,
    #[serde(default)]
    original_line: Option<u32>,
}

impl ReviewComment {
    /// Outdated comments lose `line`; their original position still counts.
    fn into_existing(self) -> Option<ExistingComment> {
        let line = self
            .start_line
            .or(self.line)
            .or(self.original_start_line)
            .or(self.original_line)?;
        Some(ExistingComment {
            file: self.path,
            line,
            body: self.body,
        })
    }
}

pub struct GithubApi {
    client: reqwest::Client,
    api_url: String,
    repository: String,
    pr_number: u64,
    commit: String,
    token: String,
}

impl GithubApi {
    pub fn from_config(config: &GithubConfig) -> Result<Self, PublishError> {
        let missing = |what: &str| PublishError::MissingSetting(what.to_string());
        let token = config
            .token
            .clone()
            .ok_or_else(|| missing(constants::ENV_GITHUB_TOKEN))?;
        let repository = config
            .repository
            .clone()
            .ok_or_else(|| missing("repository (--repo or GITHUB_REPOSITORY)"))?;
        if repository.split('/').filter(|s| !s.is_empty()).count() != 2 {
            return Err(PublishError::MissingSetting(format!(
                "repository must be `owner/name`, got `{repository}`"
            )));
        }
        let pr_number = config
            .pr_number
            .ok_or_else(|| missing("pull request number (--pr or PR_NUMBER)"))?;
        let commit = config
            .commit
            .clone()
            .ok_or_else(|| missing("head commit (--commit or GITHUB_SHA)"))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            repository,
            pr_number,
            commit,
            token,
        })
    }

    fn url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{tail}", self.api_url, self.repository)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", constants::USER_AGENT)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, PublishError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        Err(classify_status(status, &body))
    }

    /// GET every page of a list endpoint.
    async fn get_paged<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, PublishError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let request = self
                .request(reqwest::Method::GET, url)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let batch: Vec<T> = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| PublishError::Transport(format!("invalid comments response: {e}")))?;
            let len = batch.len();
            items.extend(batch);
            if len < PER_PAGE {
                break;
            }
        }
        Ok(items)
    }
}

/// Map a failed HTTP status onto a [`PublishError`].
fn classify_status(status: StatusCode, body: &str) -> PublishError {
    let detail = format!("HTTP {status}: {}", body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            PublishError::Permission(detail)
        }
        StatusCode::UNPROCESSABLE_ENTITY => PublishError::StaleAnchor(detail),
        _ => PublishError::Transport(detail),
    }
}

#[async_trait]
impl ChangeRequestApi for GithubApi {
    async fn list_comments(&self) -> Result<Vec<ExistingComment>, PublishError> {
        let url = self.url(&format!("pulls/{}/comments", self.pr_number));
        let comments: Vec<ReviewComment> = self.get_paged(&url).await?;
        Ok(comments
            .into_iter()
            .filter_map(ReviewComment::into_existing)
            .collect())
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<(), PublishError> {
        let url = self.url(&format!("pulls/{}/comments", self.pr_number));
        let mut payload = serde_json::json!({
            "body": comment.body,
            "commit_id": self.commit,
            "path": comment.file,
            "side": "RIGHT",
        });
        match comment.end_line.filter(|end| *end > comment.line) {
            Some(end) => {
                payload["start_line"] = comment.line.into();
                payload["start_side"] = "RIGHT".into();
                payload["line"] = end.into();
            }
            None => payload["line"] = comment.line.into(),
        }

        self.send(self.request(reqwest::Method::POST, &url).json(&payload))
            .await?;
        Ok(())
    }

    async fn list_general_comments(&self) -> Result<Vec<GeneralComment>, PublishError> {
        let url = self.url(&format!("issues/{}/comments", self.pr_number));
        let comments: Vec<IssueComment> = self.get_paged(&url).await?;
        Ok(comments
            .into_iter()
            .map(|c| GeneralComment {
                id: c.id,
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_general_comment(&self, body: &str) -> Result<(), PublishError> {
        let url = self.url(&format!("issues/{}/comments", self.pr_number));
        let payload = serde_json::json!({ "body": body });
        self.send(self.request(reqwest::Method::POST, &url).json(&payload))
            .await?;
        Ok(())
    }

    async fn update_general_comment(&self, id: u64, body: &str) -> Result<(), PublishError> {
        let url = self.url(&format!("issues/comments/{id}"));
        let payload = serde_json::json!({ "body": body });
        self.send(self.request(reqwest::Method::PATCH, &url).json(&payload))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn config(api_url: &str) -> GithubConfig {
        GithubConfig {
            api_url: api_url.to_string(),
            token: Some("ghp_test".into()),
            repository: Some("octo/widgets".into()),
            pr_number: Some(7),
            commit: Some("abc123".into()),
        }
    }

    fn comment_json(path: &str, line: u32, body: &str) -> serde_json::Value {
        serde_json::json!({ "path": path, "line": line, "body": body, "id": 1 })
    }

    #[test]
    fn from_config_requires_every_setting() {
        let mut cfg = config("https://api.github.com");
        cfg.token = None;
        let err = GithubApi::from_config(&cfg).err().unwrap();
        assert!(err.to_string().contains("GITHUB_TOKEN"));

        let mut cfg = config("https://api.github.com");
        cfg.pr_number = None;
        assert!(matches!(
            GithubApi::from_config(&cfg),
            Err(PublishError::MissingSetting(_))
        ));

        let mut cfg = config("https://api.github.com");
        cfg.repository = Some("widgets".into());
        assert!(GithubApi::from_config(&cfg).is_err());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "Resource not accessible"),
            PublishError::Permission(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "line must be part of the diff"),
            PublishError::StaleAnchor(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            PublishError::Transport(_)
        ));
    }

    #[tokio::test]
    async fn list_comments_follows_pages() {
        let mut server = Server::new_async().await;
        let page1: Vec<_> = (1..=100)
            .map(|i| comment_json("src/a.rs", i, "first page"))
            .collect();
        let page2 = vec![
            comment_json("src/b.rs", 5, "second page"),
            serde_json::json!({ "path": "src/old.rs", "line": null, "original_line": 9, "body": "outdated" }),
            serde_json::json!({ "path": "src/gone.rs", "line": null, "body": "file-level" }),
        ];
        let m1 = server
            .mock("GET", "/repos/octo/widgets/pulls/7/comments")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("per_page".into(), "100".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .match_header("authorization", "Bearer ghp_test")
            .with_status(200)
            .with_body(serde_json::Value::from(page1).to_string())
            .create_async()
            .await;
        let m2 = server
            .mock("GET", "/repos/octo/widgets/pulls/7/comments")
            .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
            .with_status(200)
            .with_body(serde_json::Value::from(page2).to_string())
            .create_async()
            .await;

        let api = GithubApi::from_config(&config(&server.url())).unwrap();
        let comments = api.list_comments().await.unwrap();

        m1.assert_async().await;
        m2.assert_async().await;
        assert_eq!(comments.len(), 102);
        assert_eq!(comments[100].file, "src/b.rs");
        assert_eq!(comments[101].line, 9);
    }

    #[tokio::test]
    async fn create_single_line_comment() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/pulls/7/comments")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "path": "src/a.rs",
                "line": 12,
                "side": "RIGHT",
                "commit_id": "abc123",
                "body": "hello",
            })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let api = GithubApi::from_config(&config(&server.url())).unwrap();
        api.create_comment(&NewComment {
            file: "src/a.rs".into(),
            line: 12,
            end_line: None,
            body: "hello".into(),
        })
        .await
        .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_range_comment_sets_start_line() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/pulls/7/comments")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "start_line": 10,
                "line": 14,
                "start_side": "RIGHT",
            })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let api = GithubApi::from_config(&config(&server.url())).unwrap();
        api.create_comment(&NewComment {
            file: "src/a.rs".into(),
            line: 10,
            end_line: Some(14),
            body: "range".into(),
        })
        .await
        .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unprocessable_comment_is_stale_anchor() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/octo/widgets/pulls/7/comments")
            .with_status(422)
            .with_body(r#"{"message":"Validation Failed"}"#)
            .create_async()
            .await;

        let api = GithubApi::from_config(&config(&server.url())).unwrap();
        let err = api
            .create_comment(&NewComment {
                file: "src/a.rs".into(),
                line: 99,
                end_line: None,
                body: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::StaleAnchor(_)));
        assert!(err.to_string().contains("Validation Failed"));
    }

    #[tokio::test]
    async fn general_comment_goes_to_issue_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/issues/7/comments")
            .match_body(Matcher::Json(serde_json::json!({ "body": "summary" })))
            .with_status(201)
            .with_body("{}")
            .create_async()
            .await;

        let api = GithubApi::from_config(&config(&server.url())).unwrap();
        api.create_general_comment("summary").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn general_comments_listed_and_updated() {
        let mut server = Server::new_async().await;
        let list = server
            .mock("GET", "/repos/octo/widgets/issues/7/comments")
            .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
            .with_status(200)
            .with_body(
                serde_json::json!([
                    { "id": 11, "body": "thanks!" },
                    { "id": 12, "body": "<!-- critic:summary -->\nold" },
                ])
                .to_string(),
            )
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/repos/octo/widgets/issues/comments/12")
            .match_body(Matcher::Json(serde_json::json!({ "body": "new" })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let api = GithubApi::from_config(&config(&server.url())).unwrap();
        let comments = api.list_general_comments().await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].id, 12);
        api.update_general_comment(12, "new").await.unwrap();

        list.assert_async().await;
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_is_permission_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/octo/widgets/issues/7/comments")
            .with_status(403)
            .with_body("Resource not accessible by integration")
            .create_async()
            .await;

        let api = GithubApi::from_config(&config(&server.url())).unwrap();
        let err = api.create_general_comment("summary").await.unwrap_err();
        assert!(matches!(err, PublishError::Permission(_)));
    }
}
