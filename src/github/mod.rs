//! GitHub issue analysis and search.

pub mod client;
pub mod issues;

pub use client::{GithubClient, IssueTracker};
pub use issues::IssueService;
