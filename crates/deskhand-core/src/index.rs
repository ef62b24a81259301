//! In-memory vector index over document chunks.
//!
//! A [`VectorIndex`] is built once from the chunker output and is read-only
//! afterwards, so any number of concurrent queries can share it without
//! locking. The [`IndexSlot`] wraps it in a write-once cell that doubles as
//! the readiness gate for the serving process.
//!
//! # Query Algorithm
//!
//! 1. Score every stored embedding against the query embedding with
//!    [`cosine_similarity`].
//! 2. Sort by score (desc), then chunk id (asc) so ties are deterministic.
//! 3. Truncate to `k`.

use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{BuildError, RetrievalError};
use crate::models::{Chunk, RetrievalResult, ScoredChunk};

pub const DEFAULT_TOP_K: usize = 4;

/// Default number of chunk texts sent to the embedding provider per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

struct IndexedChunk {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// Immutable chunk id → (chunk, embedding) mapping.
pub struct VectorIndex {
    entries: Vec<IndexedChunk>,
    dims: usize,
    model: String,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("chunks", &self.entries.len())
            .field("dims", &self.dims)
            .field("model", &self.model)
            .finish()
    }
}

impl VectorIndex {
    /// Embed every chunk and build the index.
    ///
    /// Chunks are sent to the provider in batches of `batch_size`. Any
    /// provider failure, short response, or inconsistent dimensionality
    /// aborts the build.
    pub async fn build(
        corpus_id: &str,
        chunks: Vec<Chunk>,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self, BuildError> {
        if chunks.is_empty() {
            return Err(BuildError::EmptyCorpus(corpus_id.to_string()));
        }

        let batch_size = batch_size.max(1);
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = provider.embed(&texts).await.map_err(BuildError::Embedding)?;
            if vectors.len() != texts.len() {
                return Err(BuildError::EmbeddingCount {
                    expected: texts.len(),
                    got: vectors.len(),
                });
            }
            embeddings.extend(vectors);
        }

        let pairs = chunks.into_iter().zip(embeddings).collect();
        Self::from_embeddings(pairs, provider.model_name())
    }

    /// Build an index from chunks that already carry embeddings.
    pub fn from_embeddings(pairs: Vec<(Chunk, Vec<f32>)>, model: &str) -> Result<Self, BuildError> {
        let dims = match pairs.first() {
            Some((_, v)) => v.len(),
            None => return Err(BuildError::EmptyCorpus(model.to_string())),
        };

        let mut entries = Vec::with_capacity(pairs.len());
        for (chunk, embedding) in pairs {
            if embedding.len() != dims {
                return Err(BuildError::DimensionMismatch {
                    chunk_id: chunk.id,
                    expected: dims,
                    got: embedding.len(),
                });
            }
            entries.push(IndexedChunk { chunk, embedding });
        }
        entries.sort_by_key(|e| e.chunk.id);

        Ok(Self {
            entries,
            dims,
            model: model.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn chunk(&self, id: u32) -> Option<&Chunk> {
        self.entries
            .binary_search_by_key(&id, |e| e.chunk.id)
            .ok()
            .map(|i| &self.entries[i].chunk)
    }

    /// Return the `k` chunks most similar to `query_vec`.
    ///
    /// The result holds exactly `min(k, len)` entries.
    pub fn query(&self, query_vec: &[f32], k: usize) -> Result<RetrievalResult, RetrievalError> {
        if query_vec.len() != self.dims {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dims,
                got: query_vec.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_vec, &e.embedding), e))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.chunk.id.cmp(&b.1.chunk.id))
        });
        scored.truncate(k);

        Ok(RetrievalResult {
            hits: scored
                .into_iter()
                .map(|(score, e)| ScoredChunk {
                    chunk: e.chunk.clone(),
                    score,
                })
                .collect(),
        })
    }
}

/// Write-once holder for the process-wide index.
///
/// Empty until startup installs the built index; readers never block.
#[derive(Debug, Default)]
pub struct IndexSlot {
    cell: OnceLock<VectorIndex>,
}

impl IndexSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the built index. Fails if one is already installed.
    pub fn install(&self, index: VectorIndex) -> Result<(), BuildError> {
        self.cell.set(index).map_err(|_| BuildError::AlreadyInstalled)
    }

    pub fn is_ready(&self) -> bool {
        self.cell.get().is_some()
    }

    /// The installed index, or [`RetrievalError::NotReady`].
    pub fn get(&self) -> Result<&VectorIndex, RetrievalError> {
        self.cell.get().ok_or(RetrievalError::NotReady)
    }
}
