//! Error taxonomy returned by the pipelines.
//!
//! Internals work with `anyhow::Result` and are folded into one of these
//! variants at the pipeline boundary, so callers never see transport errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("clone failed: {0}")]
    Clone(String),

    #[error("no files found matching extensions {0:?}")]
    NoMatchingFiles(Vec<String>),

    #[error("clone cancelled: {0}")]
    Cancelled(String),

    #[error("workspace error: {0}")]
    Workspace(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("index error: {0}")]
    Index(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("issue tracker error: {0}")]
    Tracker(String),
}

impl Error {
    /// Wrap an internal error as an index failure, keeping the context chain.
    pub fn index(err: anyhow::Error) -> Self {
        Error::Index(format!("{err:#}"))
    }

    pub fn generation(err: anyhow::Error) -> Self {
        Error::Generation(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
