use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;
use crate::git::FetchOptions;
use crate::github::{GithubClient, IssueService, IssueTracker};
use crate::llm::answer::AnswerGenerator;
use crate::llm::chat::{HttpLanguageModel, LanguageModel};
use crate::llm::embeddings::{Embedder, LocalEmbedder};
use crate::models::{Repo, RepoStatus};
use crate::pipeline::{ChatService, Indexer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub repos: Arc<RwLock<Vec<Repo>>>,
    pub indexer: Arc<Indexer>,
    pub chat: Arc<ChatService>,
    pub issues: Arc<IssueService>,
    pub clone_semaphore: Arc<tokio::sync::Semaphore>,
    /// Serializes builds and deletes of the same repository
    repo_locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
    /// Cancelled on shutdown; every pipeline runs under a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.llm.timeout_secs.max(1)))
            .build()?;

        let embedder: Arc<dyn Embedder> =
            Arc::new(LocalEmbedder::new(&config.embedding, config.model_cache_dir())?);
        let model: Arc<dyn LanguageModel> =
            Arc::new(HttpLanguageModel::new(http_client.clone(), config.llm.clone())?);
        let tracker: Arc<dyn IssueTracker> =
            Arc::new(GithubClient::new(http_client, &config.github));

        Self::with_components(config, embedder, model, tracker)
    }

    /// Build state around caller-supplied model and tracker implementations.
    pub fn with_components(
        config: Config,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        tracker: Arc<dyn IssueTracker>,
    ) -> anyhow::Result<Self> {
        // Ensure data directories exist
        std::fs::create_dir_all(config.vector_dir())?;

        // Load persisted repos
        let mut repos: Vec<Repo> = if config.db_path().exists() {
            let data = std::fs::read_to_string(config.db_path())?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };
        // A build that was running when the process stopped will never finish
        for repo in repos.iter_mut() {
            if repo.status == RepoStatus::Indexing {
                repo.status = RepoStatus::Error("interrupted by restart".to_string());
            }
        }

        let timeout = Duration::from_secs(config.llm.timeout_secs);
        let fetch_options = FetchOptions {
            timeout: Duration::from_secs(config.clone_timeout_secs),
            git_token: config.git_token.clone(),
            workspace_root: config.workspace_dir.clone(),
        };

        let indexer = Indexer::new(embedder.clone(), config.vector_dir(), fetch_options);
        let chat = ChatService::new(embedder, AnswerGenerator::new(model.clone(), timeout));
        let issues = IssueService::new(tracker, model, timeout);

        Ok(Self {
            clone_semaphore: Arc::new(tokio::sync::Semaphore::new(
                config.max_concurrent_clones.max(1),
            )),
            config,
            repos: Arc::new(RwLock::new(repos)),
            indexer: Arc::new(indexer),
            chat: Arc::new(chat),
            issues: Arc::new(issues),
            repo_locks: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        })
    }

    /// The lock guarding builds of `repo_id`.
    pub fn repo_lock(&self, repo_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.repo_locks
            .lock()
            .entry(repo_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    pub fn forget_repo_lock(&self, repo_id: Uuid) {
        self.repo_locks.lock().remove(&repo_id);
    }

    pub fn find_repo(&self, repo_id: Uuid) -> Option<Repo> {
        self.repos.read().iter().find(|r| r.id == repo_id).cloned()
    }

    /// Apply `f` to the repo (if still registered) and persist.
    pub fn update_repo(&self, repo_id: Uuid, f: impl FnOnce(&mut Repo)) {
        {
            let mut repos = self.repos.write();
            if let Some(repo) = repos.iter_mut().find(|r| r.id == repo_id) {
                f(repo);
            }
        }
        self.persist_repos();
    }

    /// Persist repos list to disk (atomic write via temp file + rename).
    pub fn persist_repos(&self) {
        let repos = self.repos.read();
        match serde_json::to_string_pretty(&*repos) {
            Ok(data) => {
                let db_path = self.config.db_path();
                let tmp_path = db_path.with_extension("json.tmp");
                if let Err(e) = std::fs::write(&tmp_path, &data)
                    .and_then(|_| std::fs::rename(&tmp_path, &db_path))
                {
                    tracing::warn!("Failed to persist repo registry: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to serialize repo registry: {e}"),
        }
    }
}
