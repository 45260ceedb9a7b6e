//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;

use repo_chat::error::{Error, Result};
use repo_chat::github::IssueTracker;
use repo_chat::llm::chat::{LanguageModel, Message};
use repo_chat::llm::embeddings::{l2_normalize, Embedder};
use repo_chat::models::{Issue, IssueComment, IssueState};

const DIM: usize = 64;

/// Bag-of-words embedder: each lowercase token bumps one hashed bucket.
pub struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        "hash-64"
    }

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}

fn hash_embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = token
            .to_lowercase()
            .bytes()
            .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
        v[bucket as usize % DIM] += 1.0;
    }
    l2_normalize(&mut v);
    v
}

/// Chat model returning a fixed reply and recording every call.
pub struct ScriptedModel {
    reply: std::result::Result<String, String>,
    pub calls: Mutex<Vec<(Vec<Message>, f32)>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[Message], temperature: f32) -> anyhow::Result<String> {
        self.calls.lock().push((messages.to_vec(), temperature));
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(message) => anyhow::bail!("{message}"),
        }
    }
}

/// In-memory tracker for a single repository, paging like GitHub.
#[derive(Default)]
pub struct FakeTracker {
    pub repo_name: String,
    /// Newest first, as the issues endpoint lists them
    pub issues: Vec<Issue>,
    /// Oldest first, as the comments endpoint lists them
    pub comments: HashMap<u64, Vec<IssueComment>>,
    pub issue_page_calls: AtomicUsize,
    pub comment_page_calls: AtomicUsize,
    pub last_labels: Mutex<Vec<String>>,
}

impl FakeTracker {
    pub fn new(repo_name: &str) -> Self {
        Self {
            repo_name: repo_name.to_string(),
            ..Self::default()
        }
    }

    pub fn issue_pages_requested(&self) -> usize {
        self.issue_page_calls.load(Ordering::SeqCst)
    }

    pub fn comment_pages_requested(&self) -> usize {
        self.comment_page_calls.load(Ordering::SeqCst)
    }

    fn check_repo(&self, repo_name: &str) -> Result<()> {
        if repo_name == self.repo_name {
            Ok(())
        } else {
            Err(Error::NotFound(format!("repository {repo_name}")))
        }
    }
}

fn page_of<T: Clone>(items: &[T], page: usize, per_page: usize) -> Vec<T> {
    items
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect()
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn get_issue(&self, repo_name: &str, number: u64) -> Result<Issue> {
        self.check_repo(repo_name)?;
        self.issues
            .iter()
            .find(|i| i.number == number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("issue #{number} in {repo_name}")))
    }

    async fn list_comments(
        &self,
        repo_name: &str,
        number: u64,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<IssueComment>> {
        self.check_repo(repo_name)?;
        self.comment_page_calls.fetch_add(1, Ordering::SeqCst);
        let all = self.comments.get(&number).cloned().unwrap_or_default();
        Ok(page_of(&all, page, per_page))
    }

    async fn list_issues_page(
        &self,
        repo_name: &str,
        state: IssueState,
        labels: &[String],
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Issue>> {
        self.check_repo(repo_name)?;
        self.issue_page_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_labels.lock() = labels.to_vec();

        let filtered: Vec<Issue> = self
            .issues
            .iter()
            .filter(|i| state == IssueState::All || i.state == state.as_str())
            .filter(|i| labels.iter().all(|l| i.labels.contains(l)))
            .cloned()
            .collect();
        Ok(page_of(&filtered, page, per_page))
    }
}

pub fn make_issue(number: u64, title: &str, body: Option<&str>) -> Issue {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(number as i64);
    Issue {
        number,
        title: title.to_string(),
        state: "open".to_string(),
        body: body.map(str::to_string),
        labels: Vec::new(),
        comments_count: 0,
        url: format!("https://github.com/acme/widgets/issues/{number}"),
        user: "octocat".to_string(),
        created_at: created,
        updated_at: created,
    }
}

pub fn make_comments(count: usize) -> Vec<IssueComment> {
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    (1..=count)
        .map(|i| IssueComment {
            user: format!("user{i}"),
            body: format!("comment {i}"),
            created_at: start + Duration::minutes(i as i64),
        })
        .collect()
}

/// Create a git repository on branch `main` with one commit holding `files`.
pub fn make_git_repo(dir: &Path, files: &[(&str, &str)]) {
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = git2::Repository::init_opts(dir, &opts).unwrap();
    commit_files(&repo, files, "initial");
}

/// Write `files` into the work tree and commit them on the current branch.
pub fn commit_files(repo: &git2::Repository, files: &[(&str, &str)], message: &str) {
    let workdir = repo.workdir().unwrap().to_path_buf();
    for (path, content) in files {
        let full = workdir.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("Test", "test@example.com").unwrap();

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}
