//! Model access: local sentence embeddings and remote chat completion.

pub mod answer;
pub mod chat;
pub mod embeddings;
