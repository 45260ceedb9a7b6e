//! Axum HTTP handlers. Handlers stay thin: validate, look up the repo, call a
//! pipeline, map the error.

pub mod chat;
pub mod issues;
pub mod repos;

use axum::http::StatusCode;

use crate::error::{Error, FetchError};

/// Handler error type, `(status, message)` like the rest of the API.
pub type ApiError = (StatusCode, String);

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Fetch(FetchError::Workspace(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Fetch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Generation(_) | Error::Tracker(_) => StatusCode::BAD_GATEWAY,
        Error::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn api_error(err: Error) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {err}");
    }
    (status, err.to_string())
}
