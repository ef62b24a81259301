//! The answering path: retrieve → assemble → synthesize.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use deskhand_core::embedding::EmbeddingProvider;
use deskhand_core::error::{RetrievalError, SynthesisError};
use deskhand_core::index::IndexSlot;
use deskhand_core::prompt;
use deskhand_core::retrieve::retrieve;
use deskhand_core::synthesize::{synthesize, Answer, CompletionProvider};

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

impl AnswerError {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, AnswerError::Retrieval(RetrievalError::NotReady))
    }
}

/// Shared handles for answering one normalized query.
#[derive(Clone)]
pub struct AnswerPipeline {
    index: Arc<IndexSlot>,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    top_k: usize,
}

impl AnswerPipeline {
    pub fn new(
        index: Arc<IndexSlot>,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            completer,
            top_k,
        }
    }

    pub fn index(&self) -> &IndexSlot {
        &self.index
    }

    pub async fn answer(&self, query: &str) -> Result<Answer, AnswerError> {
        let started = Instant::now();
        let hits = retrieve(&self.index, self.embedder.as_ref(), query, self.top_k).await?;
        let prompt = prompt::assemble(&hits, query);
        let answer = synthesize(self.completer.as_ref(), &prompt).await?;
        tracing::debug!(
            chunks = ?hits.chunk_ids(),
            grounded = answer.grounded,
            model = self.completer.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answer synthesized"
        );
        Ok(answer)
    }
}
