use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

const SNAPSHOT_FILE: &str = "index.json";

/// A stored vector entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub source: String,
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub embedding: Vec<f32>,
}

/// On-disk layout of one namespace.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    model: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub score: f32,
}

/// Read-only handle on one repository's vector snapshot.
///
/// The entries are loaded once; rebuilding the namespace on disk does not
/// change what an existing handle returns.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    path: PathBuf,
    model: String,
    dimension: usize,
    entries: Arc<Vec<IndexEntry>>,
}

impl VectorIndex {
    /// Directory of the namespace for `repo_id` under `root`.
    pub fn namespace_path(root: &Path, repo_id: Uuid) -> PathBuf {
        root.join(format!("repo_{repo_id}"))
    }

    /// Write a complete snapshot for `repo_id`, replacing any previous one.
    ///
    /// The new file is written next to the old one and renamed over it, so
    /// readers see either the old snapshot or the new one.
    pub fn build(
        root: &Path,
        repo_id: Uuid,
        model: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        let dimension = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimension) {
            anyhow::bail!(
                "Embedding dimension mismatch in {}: expected {dimension}, got {}",
                bad.source,
                bad.embedding.len()
            );
        }

        let path = Self::namespace_path(root, repo_id);
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create namespace {}", path.display()))?;

        let snapshot = Snapshot {
            model: model.to_string(),
            dimension,
            created_at: Utc::now(),
            entries,
        };
        let data = serde_json::to_vec(&snapshot).context("Failed to serialize vector index")?;

        let file = path.join(SNAPSHOT_FILE);
        let tmp = path.join(format!("{SNAPSHOT_FILE}.tmp"));
        std::fs::write(&tmp, data)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &file)
            .with_context(|| format!("Failed to replace {}", file.display()))?;

        tracing::info!(
            "Wrote {} vectors (dim {dimension}) to {}",
            snapshot.entries.len(),
            file.display()
        );

        Ok(Self {
            path,
            model: snapshot.model,
            dimension,
            entries: Arc::new(snapshot.entries),
        })
    }

    /// Load the snapshot stored in namespace directory `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = path.join(SNAPSHOT_FILE);
        let data = std::fs::read(&file)
            .with_context(|| format!("Failed to read vector index {}", file.display()))?;
        let snapshot: Snapshot = serde_json::from_slice(&data)
            .with_context(|| format!("Corrupt vector index {}", file.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            model: snapshot.model,
            dimension: snapshot.dimension,
            entries: Arc::new(snapshot.entries),
        })
    }

    /// Remove a namespace from disk. Missing namespaces are not an error.
    pub fn delete(root: &Path, repo_id: Uuid) -> Result<()> {
        let path = Self::namespace_path(root, repo_id);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    /// Return the `k` entries most similar to `vector`, best first.
    ///
    /// Equal scores keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<ScoredEntry> {
        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(vector, &e.embedding), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(score, e)| ScoredEntry {
                entry: e.clone(),
                score,
            })
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
