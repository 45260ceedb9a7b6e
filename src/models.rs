use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file fetched from a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub content: String,
}

/// A single retrieval unit cut from a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    /// 1-based start line in the original file.
    pub start_line: usize,
    /// 1-based end line in the original file.
    pub end_line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat turn (user or assistant)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Source reference returned alongside an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDoc {
    pub content: String,
    pub source: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Result of the build phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub file_count: usize,
    pub chunk_count: usize,
    pub index_path: String,
}

/// Result of the query phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub context: Vec<ContextDoc>,
}

/// A tracked repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repo {
    pub id: Uuid,
    pub url: String,
    pub name: String,
    pub branch: String,
    pub extensions: Vec<String>,
    pub status: RepoStatus,
    pub added_at: DateTime<Utc>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub file_count: usize,
    pub chunk_count: usize,
    pub index_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Indexing,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    #[default]
    Open,
    Closed,
    All,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
            IssueState::All => "all",
        }
    }
}

/// Issue metadata as returned by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub body: Option<String>,
    pub labels: Vec<String>,
    pub comments_count: u64,
    pub url: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueComment {
    pub user: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Issue plus recent comments and an optional AI analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSummary {
    #[serde(flatten)]
    pub issue: Issue,
    pub comments: Vec<IssueComment>,
    pub ai_analysis: Option<String>,
    /// Set when the analysis step failed but the issue data is still returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
}

/// Add-repo request
#[derive(Debug, Clone, Deserialize)]
pub struct AddRepoRequest {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".py".to_string()]
}

/// Chat request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub repo_id: Uuid,
    pub question: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Issue search request
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSearchRequest {
    pub repo_name: String,
    #[serde(default)]
    pub state: IssueState,
    #[serde(default)]
    pub labels: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSearchResponse {
    pub issues: Vec<Issue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_status_serializes_to_snake_case() {
        let json = serde_json::to_value(RepoStatus::Indexing).unwrap();
        assert_eq!(json, "indexing");
    }

    #[test]
    fn test_chat_turn_role_parses_lowercase() {
        let turn: ChatTurn =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(turn, ChatTurn::assistant("hi"));
    }

    #[test]
    fn test_chat_turn_rejects_system_role() {
        let parsed = serde_json::from_str::<ChatTurn>(r#"{"role":"system","content":"x"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_add_repo_request_defaults() {
        let req: AddRepoRequest =
            serde_json::from_str(r#"{"url":"https://github.com/a/b"}"#).unwrap();
        assert_eq!(req.branch, "main");
        assert_eq!(req.extensions, vec![".py"]);
    }

    #[test]
    fn test_issue_search_request_defaults_to_open() {
        let req: IssueSearchRequest = serde_json::from_str(r#"{"repo_name":"a/b"}"#).unwrap();
        assert_eq!(req.state, IssueState::Open);
        assert_eq!(req.max_results, 10);
    }
}
