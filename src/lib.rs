//! # repo-chat
//!
//! A Rust web application that clones git repositories into per-repository
//! vector indexes and answers questions about them with retrieval-augmented
//! generation. It also summarizes and searches GitHub issues.
//!
//! ## Architecture
//!
//! Two pipelines share the embedder and the on-disk namespaces:
//!
//! ```text
//!   Build (POST /api/repos, /reindex)         Query (POST /api/chat)
//!
//!   ┌──────────────────────┐                  ┌──────────────────────┐
//!   │ git clone (branch)   │                  │ open repo_{id}       │
//!   │ into a TempDir       │                  │ snapshot             │
//!   └──────────┬───────────┘                  └──────────┬───────────┘
//!              │ files matching extensions               │
//!              ▼                                         ▼
//!   ┌──────────────────────┐                  ┌──────────────────────┐
//!   │ Chunk: AST top-level │                  │ embed question,      │
//!   │ nodes, separators,   │                  │ cosine top-3         │
//!   │ 1000 chars / 200 ovl │                  └──────────┬───────────┘
//!   └──────────┬───────────┘                             │
//!              ▼                                         ▼
//!   ┌──────────────────────┐                  ┌──────────────────────┐
//!   │ fastembed MiniLM     │                  │ system + context,    │
//!   │ (unit vectors)       │                  │ history, question    │
//!   └──────────┬───────────┘                  │ → chat model, t=0    │
//!              ▼                              └──────────┬───────────┘
//!   ┌──────────────────────┐                             ▼
//!   │ vectors/repo_{id}/   │                    answer + context docs
//!   │ index.json (swap)    │
//!   └──────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dirs, models and GitHub
//! - [`error`] - Error taxonomy returned by the pipelines
//! - [`models`] - Shared data types: `Document`, `Chunk`, `Repo`, issues, request/response types
//! - [`git`] - Branch clone into a scoped workspace and suffix-filtered file collection
//! - [`chunking`] - Language-aware recursive splitting with overlap
//! - [`llm::embeddings`] - Local sentence embeddings via fastembed
//! - [`llm::chat`] - Chat completion over Ollama, OpenAI-compatible or Gemini APIs
//! - [`llm::answer`] - RAG prompt assembly and answer generation
//! - [`search::vector`] - Per-repository vector snapshots with cosine similarity
//! - [`search::retriever`] - Top-k retrieval with previews
//! - [`github`] - Issue analysis and filtered issue search
//! - [`pipeline`] - The `index` and `ask` pipelines
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state, repo registry and per-repo build locks

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
