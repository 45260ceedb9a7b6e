//! Per-repository vector storage and retrieval.

pub mod retriever;
pub mod vector;
