use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::{api_error, ApiError};
use crate::models::{IssueSearchRequest, IssueSearchResponse, IssueSummary};
use crate::state::AppState;

/// GET /api/issues/{owner}/{repo}/{number} - Fetch and analyze one issue
pub async fn analyze_issue(
    State(state): State<AppState>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
) -> Result<Json<IssueSummary>, ApiError> {
    let repo_name = format!("{owner}/{repo}");
    let summary = state
        .issues
        .analyze_issue(&repo_name, number)
        .await
        .map_err(api_error)?;
    Ok(Json(summary))
}

/// POST /api/issues/search - Filter issues by state, labels and keywords
pub async fn search_issues(
    State(state): State<AppState>,
    Json(req): Json<IssueSearchRequest>,
) -> Result<Json<IssueSearchResponse>, ApiError> {
    if req.repo_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "repo_name is required".to_string()));
    }

    let issues = state
        .issues
        .search_issues(
            req.repo_name.trim(),
            req.state,
            &req.labels,
            &req.keywords,
            req.max_results,
        )
        .await
        .map_err(api_error)?;
    Ok(Json(IssueSearchResponse { issues }))
}
