//! Retrieval-augmented answer generation.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::llm::chat::{LanguageModel, Message};
use crate::models::{AskResponse, ChatTurn};
use crate::search::retriever::RetrievedChunk;

const SYSTEM_PROMPT: &str = "You are an AI assistant that helps developers understand code. \
Use the following pieces of context from the codebase to answer the question. \
If you don't know the answer, just say that you don't know, don't try to make up an answer. \
When referencing code, be specific about file locations.";

/// Answers are meant to be reproducible for the same context.
const ANSWER_TEMPERATURE: f32 = 0.0;

pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Ask the model `question` grounded in `retrieved`, continuing `history`.
    ///
    /// An empty `retrieved` still produces an answer; the model is told the
    /// context is empty and decides what to say.
    pub async fn generate(
        &self,
        question: &str,
        retrieved: &[RetrievedChunk],
        history: &[ChatTurn],
        cancel: &CancellationToken,
    ) -> Result<AskResponse> {
        let messages = build_messages(question, retrieved, history);

        let answer = tokio::select! {
            result = self.model.complete(&messages, ANSWER_TEMPERATURE) => {
                result.map_err(Error::generation)?
            }
            _ = tokio::time::sleep(self.timeout) => {
                tracing::warn!("Answer generation timed out after {}s", self.timeout.as_secs());
                return Err(Error::Generation(format!(
                    "model call timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            _ = cancel.cancelled() => {
                return Err(Error::Generation("cancelled by caller".to_string()));
            }
        };

        tracing::info!(
            "Generated answer with {} ({} context chunks, {} history turns)",
            self.model.model_id(),
            retrieved.len(),
            history.len()
        );

        Ok(AskResponse {
            answer,
            context: retrieved.iter().map(RetrievedChunk::to_context_doc).collect(),
        })
    }
}

/// System instruction with context, then history in order, then the question.
pub fn build_messages(
    question: &str,
    retrieved: &[RetrievedChunk],
    history: &[ChatTurn],
) -> Vec<Message> {
    let context = retrieved
        .iter()
        .map(|chunk| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(format!(
        "{SYSTEM_PROMPT}\n\nContext from codebase:\n{context}"
    )));
    messages.extend(history.iter().map(Message::from));
    messages.push(Message::user(question));
    messages
}
