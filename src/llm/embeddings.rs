//! Sentence embeddings computed locally with fastembed.
//!
//! Vectors are L2-normalized so cosine similarity reduces to a dot product
//! and scores from different batches are comparable.

use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EmbeddingConfig;

/// Maps text to fixed-dimension unit vectors.
///
/// Implementations are synchronous and may be CPU-heavy; async callers go
/// through [`embed_blocking`].
pub trait Embedder: Send + Sync {
    /// Identifier recorded in every index built with this embedder.
    fn model_id(&self) -> &str;

    /// Embed each text independently. Output order matches input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .context("No embedding returned")
    }
}

/// Run an embedder on the blocking pool.
pub async fn embed_blocking(
    embedder: Arc<dyn Embedder>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .context("Embedding task panicked")?
}

/// fastembed-backed embedder. The model is loaded (and downloaded into the
/// cache dir if needed) on first use.
pub struct LocalEmbedder {
    model: EmbeddingModel,
    model_id: String,
    cache_dir: PathBuf,
    max_chars: usize,
    batch_size: usize,
    runtime: Mutex<Option<TextEmbedding>>,
}

impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig, cache_dir: PathBuf) -> Result<Self> {
        let model = config_to_fastembed_model(&config.model)?;
        Ok(Self {
            model,
            model_id: config.model.to_lowercase(),
            cache_dir,
            max_chars: config.max_chars,
            batch_size: config.batch_size.max(1),
            runtime: Mutex::new(None),
        })
    }

    fn load<'a>(&self, slot: &'a mut Option<TextEmbedding>) -> Result<&'a mut TextEmbedding> {
        if slot.is_none() {
            tracing::info!(
                "Loading embedding model {} (cache: {})",
                self.model_id,
                self.cache_dir.display()
            );
            std::fs::create_dir_all(&self.cache_dir).with_context(|| {
                format!("Failed to create model cache dir {}", self.cache_dir.display())
            })?;
            let init = InitOptions::new(self.model.clone())
                .with_cache_dir(self.cache_dir.clone())
                .with_show_download_progress(false);
            let runtime =
                TextEmbedding::try_new(init).context("Failed to initialize fastembed model")?;
            *slot = Some(runtime);
        }
        slot.as_mut().context("Embedding model not loaded")
    }
}

impl Embedder for LocalEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // The runtime lock is held per batch so query embeddings interleave
        // with a large build
        let mut embeddings = embed_in_batches(texts, self.batch_size, |batch| {
            let prepared: Vec<Cow<'_, str>> = batch
                .iter()
                .map(|t| truncate_to_chars(t, self.max_chars))
                .collect();
            let mut guard = self.runtime.lock();
            let vectors = self
                .load(&mut *guard)?
                .embed(&prepared, Some(self.batch_size))
                .context("Local embedding failed")?;
            Ok(vectors)
        })?;

        for embedding in embeddings.iter_mut() {
            l2_normalize(embedding);
        }
        tracing::debug!("Embedded {} texts with {}", embeddings.len(), self.model_id);
        Ok(embeddings)
    }
}

/// Feed `texts` to `embed` in slices of at most `batch_size`, concatenating
/// the results in input order.
fn embed_in_batches<F>(texts: &[String], batch_size: usize, mut embed: F) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&[String]) -> Result<Vec<Vec<f32>>>,
{
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = embed(batch)?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedding runtime returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            );
        }
        out.extend(vectors);
    }
    Ok(out)
}

fn config_to_fastembed_model(name: &str) -> Result<EmbeddingModel> {
    match name.trim().to_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "all-minilm-l12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        other => anyhow::bail!("Unsupported embedding model: {other}"),
    }
}

/// Cut `input` to at most `max_chars` characters.
fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Borrowed(&input[..idx]),
        None => Cow::Borrowed(input),
    }
}

pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}
