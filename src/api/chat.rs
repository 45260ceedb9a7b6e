use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::path::PathBuf;

use crate::api::{api_error, ApiError};
use crate::models::{AskResponse, ChatRequest};
use crate::state::AppState;

/// POST /api/chat - Answer a question about one indexed repo
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question is required".to_string()));
    }

    let repo = state
        .find_repo(req.repo_id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Repo not found".to_string()))?;
    // Any published snapshot stays queryable, including while a rebuild runs
    // and after one fails
    let index_path = repo.index_path.as_deref().map(PathBuf::from).ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            format!("Repo {} has no index yet", repo.name),
        )
    })?;

    let cancel = state.shutdown.child_token();
    let response = state
        .chat
        .ask(question, &index_path, &req.history, &cancel)
        .await
        .map_err(api_error)?;

    Ok(Json(response))
}
