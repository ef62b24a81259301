//! Core data models shared by the answering pipeline and the conversation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The reference text every answer is grounded in.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// SHA-256 of the raw text, used to identify which corpus revision an
    /// index was built from.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A bounded span of the canonical document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Emission order, 0-based and contiguous.
    pub id: u32,
    pub text: String,
    /// Character offset of the first character within the canonical text.
    pub source_offset: usize,
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Top-k retrieval output, ordered by descending score then ascending chunk id.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }

    pub fn chunk_ids(&self) -> Vec<u32> {
        self.hits.iter().map(|h| h.chunk.id).collect()
    }
}

/// An unanswered question handed off for human follow-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub name: String,
    pub email: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

impl EscalationRecord {
    pub fn new(name: impl Into<String>, email: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            query: query.into(),
            timestamp: Utc::now(),
        }
    }
}
