//! Startup phase: configuration → collaborators → corpus → index.
//!
//! Collaborator construction fails with a `ConfigError` and the index build
//! with a `BuildError`; both are fatal and propagate to `main`.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;

use deskhand_core::chunk::chunk_document;
use deskhand_core::embedding::EmbeddingProvider;
use deskhand_core::index::{IndexSlot, VectorIndex};
use deskhand_core::models::Chunk;
use deskhand_core::store::memory::InMemoryEscalationStore;
use deskhand_core::store::EscalationStore;
use deskhand_core::synthesize::CompletionProvider;

use crate::completion::create_completer;
use crate::config::{Config, ConfigError};
use crate::conversation::ConversationEngine;
use crate::corpus::load_corpus;
use crate::embedding::create_embedder;
use crate::pipeline::AnswerPipeline;
use crate::sqlite_store::SqliteEscalationStore;

/// The three external collaborators every turn may touch.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completer: Arc<dyn CompletionProvider>,
    pub store: Arc<dyn EscalationStore>,
}

impl Collaborators {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let completer = create_completer(&config.completion)?;
        let store = create_store(config).await?;
        tracing::info!(
            embedding = embedder.model_name(),
            completion = completer.model_name(),
            store = store.backend(),
            "collaborators ready"
        );
        Ok(Self {
            embedder,
            completer,
            store,
        })
    }
}

pub async fn create_store(config: &Config) -> Result<Arc<dyn EscalationStore>> {
    match config.escalation.store.as_str() {
        "sqlite" => Ok(Arc::new(SqliteEscalationStore::open(config).await?)),
        "memory" => Ok(Arc::new(InMemoryEscalationStore::new())),
        other => Err(ConfigError::UnknownProvider {
            kind: "escalation store",
            name: other.to_string(),
        }
        .into()),
    }
}

/// Load the corpus file and split it into chunks.
pub fn prepare_chunks(config: &Config) -> Result<Vec<Chunk>> {
    let document = load_corpus(config)
        .with_context(|| format!("Failed to load corpus {}", config.corpus.path.display()))?;
    let chunks = chunk_document(&document, &config.chunking.options());
    tracing::info!(
        corpus_id = %document.id,
        fingerprint = %document.fingerprint(),
        chunks = chunks.len(),
        "corpus chunked"
    );
    Ok(chunks)
}

/// Load, chunk, and embed the corpus.
pub async fn build_index(config: &Config, embedder: &dyn EmbeddingProvider) -> Result<VectorIndex> {
    let started = Instant::now();
    let chunks = prepare_chunks(config)?;
    let index = VectorIndex::build(
        &config.corpus_id(),
        chunks,
        embedder,
        config.embedding.batch_size,
    )
    .await?;
    tracing::info!(
        chunks = index.len(),
        dims = index.dims(),
        model = index.model(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "vector index built"
    );
    Ok(index)
}

/// Build the index and install it, opening the readiness gate.
pub async fn build_into(
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    slot: &IndexSlot,
) -> Result<()> {
    let index = build_index(config, embedder).await?;
    slot.install(index)?;
    Ok(())
}

/// Wire a conversation engine around an (initially empty) index slot.
pub fn assemble_engine(
    config: &Config,
    collaborators: &Collaborators,
) -> (Arc<ConversationEngine>, Arc<IndexSlot>) {
    let slot = Arc::new(IndexSlot::new());
    let pipeline = AnswerPipeline::new(
        slot.clone(),
        collaborators.embedder.clone(),
        collaborators.completer.clone(),
        config.retrieval.top_k,
    );
    let engine = ConversationEngine::new(config, pipeline, collaborators.store.clone());
    (Arc::new(engine), slot)
}
