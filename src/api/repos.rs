use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::api::ApiError;
use crate::models::{AddRepoRequest, Repo, RepoStatus};
use crate::search::vector::VectorIndex;
use crate::state::AppState;

/// GET /api/repos - List all repos
pub async fn list_repos(State(state): State<AppState>) -> Json<Vec<Repo>> {
    Json(state.repos.read().clone())
}

/// POST /api/repos - Register a repo and index it in the background
pub async fn add_repo(
    State(state): State<AppState>,
    Json(req): Json<AddRepoRequest>,
) -> Result<(StatusCode, Json<Repo>), ApiError> {
    let url = req.url.trim().to_string();
    if url.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "URL is required".to_string()));
    }

    // Remote URLs only
    if !url.starts_with("https://") && !url.starts_with("git://") && !url.starts_with("http://") {
        return Err((
            StatusCode::BAD_REQUEST,
            "Only https://, http://, and git:// URLs are allowed".to_string(),
        ));
    }

    let extensions: Vec<String> = req
        .extensions
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    if extensions.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "At least one file extension is required".to_string(),
        ));
    }

    let branch = req.branch.trim().to_string();
    {
        let repos = state.repos.read();
        if repos.iter().any(|r| r.url == url && r.branch == branch) {
            return Err((
                StatusCode::CONFLICT,
                "This repo and branch have already been added".to_string(),
            ));
        }
    }

    let repo = Repo {
        id: Uuid::new_v4(),
        name: repo_name_from_url(&url),
        url,
        branch,
        extensions,
        status: RepoStatus::Indexing,
        added_at: Utc::now(),
        indexed_at: None,
        file_count: 0,
        chunk_count: 0,
        index_path: None,
    };

    state.repos.write().push(repo.clone());
    state.persist_repos();

    spawn_index(state, repo.id);
    Ok((StatusCode::CREATED, Json(repo)))
}

/// DELETE /api/repos/{id} - Remove a repo and its namespace
pub async fn delete_repo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.find_repo(id).is_none() {
        return Err((StatusCode::NOT_FOUND, "Repo not found".to_string()));
    }

    // Wait for a running build so it cannot recreate the namespace afterwards
    let lock = state.repo_lock(id);
    let _guard = lock.lock().await;

    if let Err(e) = VectorIndex::delete(&state.config.vector_dir(), id) {
        tracing::warn!("Failed to delete vector data for {id}: {e:#}");
    }

    state.repos.write().retain(|r| r.id != id);
    state.persist_repos();
    state.forget_repo_lock(id);

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/repos/{id}/reindex - Rebuild the namespace from a fresh clone
pub async fn reindex_repo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Repo>), ApiError> {
    let repo = state
        .find_repo(id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Repo not found".to_string()))?;
    if repo.status == RepoStatus::Indexing {
        return Err((
            StatusCode::CONFLICT,
            "Repo is already being indexed".to_string(),
        ));
    }

    state.update_repo(id, |r| r.status = RepoStatus::Indexing);
    spawn_index(state.clone(), id);

    let repo = state.find_repo(id).unwrap_or(repo);
    Ok((StatusCode::ACCEPTED, Json(repo)))
}

fn spawn_index(state: AppState, repo_id: Uuid) {
    tokio::spawn(async move {
        if let Err(message) = index_repo(&state, repo_id).await {
            tracing::error!("Failed to index repo {repo_id}: {message}");
            state.update_repo(repo_id, |r| r.status = RepoStatus::Error(message));
        }
    });
}

/// Build (or rebuild) one repo's index and record the outcome.
async fn index_repo(state: &AppState, repo_id: Uuid) -> Result<(), String> {
    let lock = state.repo_lock(repo_id);
    let _guard = lock.lock().await;

    // The repo may have been deleted while we waited
    let Some(repo) = state.find_repo(repo_id) else {
        return Ok(());
    };

    let _permit = state
        .clone_semaphore
        .acquire()
        .await
        .map_err(|_| "Clone semaphore closed".to_string())?;

    tracing::info!("Indexing {} ({}) branch {}", repo.name, repo.url, repo.branch);
    let cancel = state.shutdown.child_token();
    let summary = state
        .indexer
        .index(&repo.url, &repo.branch, &repo.extensions, repo_id, &cancel)
        .await
        .map_err(|e| e.to_string())?;

    state.update_repo(repo_id, |r| {
        r.status = RepoStatus::Ready;
        r.indexed_at = Some(Utc::now());
        r.file_count = summary.file_count;
        r.chunk_count = summary.chunk_count;
        r.index_path = Some(summary.index_path.clone());
    });
    tracing::info!(
        "Repo {} is ready: {} files, {} chunks",
        repo.name,
        summary.file_count,
        summary.chunk_count
    );
    Ok(())
}

/// Derive a display name from the last path segment of a clone URL.
fn repo_name_from_url(url: &str) -> String {
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .trim_end_matches(".git");
    if name.is_empty() {
        "repo".to_string()
    } else {
        name.to_string()
    }
}
