use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::GithubConfig;
use crate::error::{Error, Result};
use crate::models::{Issue, IssueComment, IssueState};

/// Largest page size the GitHub REST API accepts.
pub const MAX_PER_PAGE: usize = 100;

/// Read-only access to an issue tracker, one request per call.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn get_issue(&self, repo_name: &str, number: u64) -> Result<Issue>;

    /// One page (1-based) of an issue's comments, oldest first.
    async fn list_comments(
        &self,
        repo_name: &str,
        number: u64,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<IssueComment>>;

    /// One page (1-based) of issues filtered by state and labels, newest first.
    async fn list_issues_page(
        &self,
        repo_name: &str,
        state: IssueState,
        labels: &[String],
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Issue>>;
}

/// Split `owner/repo` into its parts.
pub fn parse_repo_name(repo_name: &str) -> Result<(&str, &str)> {
    let mut parts = repo_name.trim().split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner, repo))
        }
        _ => Err(Error::NotFound(format!(
            "invalid repository name {repo_name:?}, expected owner/repo"
        ))),
    }
}

/// GitHub REST v3 client.
pub struct GithubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(client: reqwest::Client, config: &GithubConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        what: &str,
    ) -> Result<T> {
        let mut req = self
            .client
            .get(url)
            .query(query)
            .header("User-Agent", "repo-chat")
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Tracker(format!("Failed to call GitHub API for {what}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Tracker(format!("GitHub API returned {status} for {what}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| Error::Tracker(format!("Failed to parse GitHub response for {what}: {e}")))
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    async fn get_issue(&self, repo_name: &str, number: u64) -> Result<Issue> {
        let (owner, repo) = parse_repo_name(repo_name)?;
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}", self.api_base);
        let raw: GhIssue = self
            .get_json(&url, &[], &format!("issue #{number} in {owner}/{repo}"))
            .await?;
        Ok(raw.into())
    }

    async fn list_comments(
        &self,
        repo_name: &str,
        number: u64,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<IssueComment>> {
        let (owner, repo) = parse_repo_name(repo_name)?;
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}/comments", self.api_base);
        let query = [
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        let raw: Vec<GhComment> = self
            .get_json(&url, &query, &format!("comments of #{number} in {owner}/{repo}"))
            .await?;
        Ok(raw.into_iter().map(Into::into).collect())
    }

    async fn list_issues_page(
        &self,
        repo_name: &str,
        state: IssueState,
        labels: &[String],
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Issue>> {
        let (owner, repo) = parse_repo_name(repo_name)?;
        let url = format!("{}/repos/{owner}/{repo}/issues", self.api_base);
        let mut query = vec![
            ("state", state.as_str().to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        if !labels.is_empty() {
            query.push(("labels", labels.join(",")));
        }
        let raw: Vec<GhIssue> = self
            .get_json(&url, &query, &format!("issues in {owner}/{repo}"))
            .await?;
        tracing::debug!("Fetched issue page {page} of {owner}/{repo}: {} items", raw.len());
        Ok(raw.into_iter().map(Into::into).collect())
    }
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    state: String,
    body: Option<String>,
    #[serde(default)]
    labels: Vec<GhLabel>,
    #[serde(default)]
    comments: u64,
    html_url: String,
    user: Option<GhUser>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct GhComment {
    user: Option<GhUser>,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

/// Deleted accounts come back as `null`; GitHub shows them as "ghost".
fn login(user: Option<GhUser>) -> String {
    user.map(|u| u.login).unwrap_or_else(|| "ghost".to_string())
}

impl From<GhIssue> for Issue {
    fn from(raw: GhIssue) -> Self {
        Issue {
            number: raw.number,
            title: raw.title,
            state: raw.state,
            body: raw.body,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            comments_count: raw.comments,
            url: raw.html_url,
            user: login(raw.user),
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

impl From<GhComment> for IssueComment {
    fn from(raw: GhComment) -> Self {
        IssueComment {
            user: login(raw.user),
            body: raw.body.unwrap_or_default(),
            created_at: raw.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_name() {
        assert_eq!(parse_repo_name("rust-lang/rust").unwrap(), ("rust-lang", "rust"));
        assert!(matches!(parse_repo_name("rust"), Err(Error::NotFound(_))));
        assert!(parse_repo_name("a/b/c").is_err());
        assert!(parse_repo_name("/b").is_err());
    }

    #[test]
    fn test_issue_from_wire() {
        let raw = r#"{
            "number": 42,
            "title": "Crash on start",
            "state": "open",
            "body": null,
            "labels": [{"name": "bug"}, {"name": "p1"}],
            "comments": 7,
            "html_url": "https://github.com/o/r/issues/42",
            "user": {"login": "octocat"},
            "created_at": "2024-01-02T03:04:05Z",
            "updated_at": "2024-01-03T03:04:05Z"
        }"#;
        let issue: Issue = serde_json::from_str::<GhIssue>(raw).unwrap().into();
        assert_eq!(issue.number, 42);
        assert_eq!(issue.labels, vec!["bug", "p1"]);
        assert_eq!(issue.comments_count, 7);
        assert_eq!(issue.user, "octocat");
        assert!(issue.body.is_none());
    }

    #[test]
    fn test_comment_from_deleted_user() {
        let raw = r#"{"user": null, "body": "me too", "created_at": "2024-01-02T03:04:05Z"}"#;
        let comment: IssueComment = serde_json::from_str::<GhComment>(raw).unwrap().into();
        assert_eq!(comment.user, "ghost");
        assert_eq!(comment.body, "me too");
    }

    #[tokio::test]
    async fn test_invalid_repo_name_fails_without_request() {
        let client = GithubClient::new(
            reqwest::Client::new(),
            &GithubConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                token: None,
            },
        );
        let result = client.get_issue("not-a-repo", 1).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
