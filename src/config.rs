use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the repo registry, vector namespaces and model cache live
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Chat model configuration
    pub llm: LlmConfig,
    /// Local embedding model configuration
    pub embedding: EmbeddingConfig,
    /// GitHub API configuration for issue analysis
    pub github: GithubConfig,
    /// Maximum concurrent clone operations
    pub max_concurrent_clones: usize,
    /// Clone timeout in seconds
    pub clone_timeout_secs: u64,
    /// Git personal access token for cloning private repos
    pub git_token: Option<String>,
    /// Parent directory for clone workspaces (system temp dir when unset)
    pub workspace_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama", "openai" or "gemini"
    pub provider: String,
    /// Base URL for the chat API
    pub base_url: String,
    /// Model name for answers and issue analysis
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// fastembed model name, e.g. "all-minilm-l6-v2"
    pub model: String,
    /// Texts longer than this are cut before embedding
    pub max_chars: usize,
    /// Batch size handed to the embedding runtime
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API root, overridable for GitHub Enterprise
    pub api_base: String,
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9000".to_string(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            github: GithubConfig::default(),
            max_concurrent_clones: 2,
            clone_timeout_secs: 300,
            git_token: None,
            workspace_dir: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm-l6-v2".to_string(),
            max_chars: 2000,
            batch_size: 64,
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("REPO_CHAT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("REPO_CHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(val) = std::env::var("REPO_CHAT_MAX_CONCURRENT_CLONES") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_clones = v;
            }
        }
        if let Ok(val) = std::env::var("REPO_CHAT_CLONE_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.clone_timeout_secs = v;
            }
        }
        if let Ok(token) = std::env::var("REPO_CHAT_GIT_TOKEN") {
            config.git_token = Some(token);
        }
        if let Ok(dir) = std::env::var("REPO_CHAT_WORKSPACE_DIR") {
            config.workspace_dir = Some(PathBuf::from(dir));
        }

        // Chat model
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("LLM_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.llm.timeout_secs = v;
            }
        }

        // Embeddings
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(val) = std::env::var("EMBEDDING_MAX_CHARS") {
            if let Ok(v) = val.parse::<usize>() {
                if v > 0 {
                    config.embedding.max_chars = v;
                }
            }
        }
        if let Ok(val) = std::env::var("EMBEDDING_BATCH_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.embedding.batch_size = v.clamp(1, 1024);
            }
        }

        // GitHub
        if let Ok(url) = std::env::var("GITHUB_API_URL") {
            config.github.api_base = url.trim_end_matches('/').to_string();
        }
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            config.github.token = Some(token);
        }

        config
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn model_cache_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("repos.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_live_under_data_dir() {
        let config = Config::default();
        assert_eq!(config.vector_dir(), PathBuf::from("./data/vectors"));
        assert_eq!(config.db_path(), PathBuf::from("./data/repos.json"));
        assert_eq!(config.model_cache_dir(), PathBuf::from("./data/models"));
    }

    #[test]
    fn test_default_embedding_model_is_minilm() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.model, "all-minilm-l6-v2");
        assert_eq!(config.max_chars, 2000);
    }
}
