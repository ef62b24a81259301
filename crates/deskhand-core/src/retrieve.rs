//! Query-time retrieval: normalize, embed, and look up the top-k chunks.

use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::RetrievalError;
use crate::index::IndexSlot;
use crate::models::RetrievalResult;
use crate::normalize::normalize;

/// Retrieve the `k` chunks most similar to `raw_query`.
///
/// Fails with [`RetrievalError::NotReady`] before the index is installed,
/// without calling the embedding provider. A query that normalizes to
/// nothing yields an empty result.
pub async fn retrieve(
    slot: &IndexSlot,
    provider: &dyn EmbeddingProvider,
    raw_query: &str,
    k: usize,
) -> Result<RetrievalResult, RetrievalError> {
    let index = slot.get()?;

    let query = normalize(raw_query);
    if query.is_empty() {
        return Ok(RetrievalResult::default());
    }

    let query_vec = embed_one(provider, &query)
        .await
        .map_err(RetrievalError::Embedding)?;

    index.query(&query_vec, k)
}
