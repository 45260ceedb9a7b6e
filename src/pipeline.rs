//! The two end-to-end pipelines: building a repository's index and answering
//! a question against it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chunking::{self, ChunkOptions, Language};
use crate::error::{Error, Result};
use crate::git::{self, FetchOptions};
use crate::llm::answer::AnswerGenerator;
use crate::llm::embeddings::{embed_blocking, Embedder};
use crate::models::{AskResponse, ChatTurn, IndexSummary};
use crate::search::retriever::Retriever;
use crate::search::vector::{IndexEntry, VectorIndex};

/// Build phase: fetch → chunk → embed → write namespace.
///
/// Holds no locks; callers serialize builds of the same repository.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    vector_root: PathBuf,
    fetch_options: FetchOptions,
    chunk_options: ChunkOptions,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, vector_root: PathBuf, fetch_options: FetchOptions) -> Self {
        Self {
            embedder,
            vector_root,
            fetch_options,
            chunk_options: ChunkOptions::default(),
        }
    }

    pub async fn index(
        &self,
        repo_url: &str,
        branch: &str,
        extensions: &[String],
        repo_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<IndexSummary> {
        let documents = git::fetch(repo_url, branch, extensions, &self.fetch_options, cancel).await?;

        let language = Language::from_extensions(extensions);
        let chunks = chunking::chunk_documents(&documents, language, self.chunk_options);
        tracing::info!(
            "Split {} files into {} chunks ({language:?})",
            documents.len(),
            chunks.len()
        );

        if cancel.is_cancelled() {
            return Err(Error::Index("cancelled before embedding".to_string()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = embed_blocking(self.embedder.clone(), texts)
            .await
            .map_err(Error::index)?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Index(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                source: chunk.source,
                content: chunk.content,
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                embedding,
            })
            .collect();
        let chunk_count = entries.len();

        let root = self.vector_root.clone();
        let model = self.embedder.model_id().to_string();
        let index = tokio::task::spawn_blocking(move || {
            VectorIndex::build(&root, repo_id, &model, entries)
        })
        .await
        .map_err(|e| Error::Index(format!("index write task failed: {e}")))?
        .map_err(Error::index)?;

        Ok(IndexSummary {
            file_count: documents.len(),
            chunk_count,
            index_path: index.path().to_string_lossy().into_owned(),
        })
    }
}

/// Query phase: open snapshot → retrieve → generate.
pub struct ChatService {
    embedder: Arc<dyn Embedder>,
    generator: AnswerGenerator,
}

impl ChatService {
    pub fn new(embedder: Arc<dyn Embedder>, generator: AnswerGenerator) -> Self {
        Self { embedder, generator }
    }

    pub async fn ask(
        &self,
        question: &str,
        index_path: &Path,
        history: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> Result<AskResponse> {
        let path = index_path.to_path_buf();
        let index = tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Err(Error::NotFound(format!("no index at {}", path.display())));
            }
            VectorIndex::open(&path).map_err(Error::index)
        })
        .await
        .map_err(|e| Error::Index(format!("index open task failed: {e}")))??;

        if !index.is_empty() && index.model() != self.embedder.model_id() {
            tracing::warn!(
                "Index {} was built with {}, querying with {}",
                index_path.display(),
                index.model(),
                self.embedder.model_id()
            );
        }

        let retriever = Retriever::new(index, self.embedder.clone());
        let retrieved = retriever.retrieve(question).await.map_err(Error::index)?;

        self.generator
            .generate(question, &retrieved, history, cancel)
            .await
    }
}
