//! Source fetching: clone into a scoped workspace and collect matching files.

pub mod clone;

pub use clone::{fetch, FetchOptions};
