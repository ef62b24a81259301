//! Error taxonomy for the answering pipeline.
//!
//! [`BuildError`] is fatal: a process that cannot build its index must not
//! serve traffic. The other three are recoverable and are turned into fixed
//! replies by the conversation layer.

use thiserror::Error;

/// Index construction failed.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("corpus '{0}' produced no chunks")]
    EmptyCorpus(String),
    #[error("embedding provider failed during index build: {0:#}")]
    Embedding(#[source] anyhow::Error),
    #[error("embedding provider returned {got} vectors for a batch of {expected}")]
    EmbeddingCount { expected: usize, got: usize },
    #[error("chunk {chunk_id} embedded with {got} dimensions, expected {expected}")]
    DimensionMismatch {
        chunk_id: u32,
        expected: usize,
        got: usize,
    },
    #[error("index already installed")]
    AlreadyInstalled,
}

/// A retrieval request could not be served.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Startup has not finished building the index. Callers report
    /// "not ready", never "no answer".
    #[error("vector index is not ready")]
    NotReady,
    #[error("query embedding failed: {0:#}")]
    Embedding(#[source] anyhow::Error),
    #[error("query embedded with {got} dimensions, index uses {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// The completion collaborator failed to produce an answer.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("completion provider failed: {0:#}")]
    Completion(#[source] anyhow::Error),
}

/// The storage collaborator failed to persist an escalation record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("escalation storage failed: {0:#}")]
    Storage(#[source] anyhow::Error),
}
