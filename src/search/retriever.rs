use anyhow::{Context, Result};
use std::sync::Arc;

use crate::llm::embeddings::{embed_blocking, Embedder};
use crate::models::ContextDoc;
use crate::search::vector::VectorIndex;

/// Number of chunks handed to the answer generator.
pub const TOP_K: usize = 3;

/// Characters of each chunk echoed back to the caller.
pub const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// Full chunk text, used in the prompt
    pub content: String,
    pub source: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f32,
}

impl RetrievedChunk {
    /// Caller-facing view with the content cut to [`PREVIEW_CHARS`].
    pub fn to_context_doc(&self) -> ContextDoc {
        ContextDoc {
            content: preview(&self.content),
            source: self.source.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
        }
    }
}

/// Nearest-neighbour lookup of a question against one index snapshot.
pub struct Retriever {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            k: TOP_K,
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        if self.index.is_empty() {
            tracing::debug!("Index {} is empty, skipping retrieval", self.index.path().display());
            return Ok(Vec::new());
        }

        let query_vec = embed_blocking(self.embedder.clone(), vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .context("No query embedding returned")?;

        let hits = self.index.query(&query_vec, self.k);
        tracing::debug!("Retrieved {} chunks for query", hits.len());

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                content: hit.entry.content,
                source: hit.entry.source,
                start_line: hit.entry.start_line,
                end_line: hit.entry.end_line,
                score: hit.score,
            })
            .collect())
    }
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => content[..idx].to_string(),
        None => content.to_string(),
    }
}
