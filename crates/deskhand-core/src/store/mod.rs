//! Escalation storage abstraction.
//!
//! The [`EscalationStore`] trait is the storage collaborator: it persists
//! [`EscalationRecord`]s for human follow-up. The [`EscalationRecorder`]
//! wraps a store with the best-effort contract the conversation layer
//! relies on: a failure is logged and reported, never propagated as fatal.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RecordError;
use crate::models::EscalationRecord;

/// Abstract storage backend for escalation records.
///
/// | Implementation | Crate |
/// |----------------|-------|
/// | [`memory::InMemoryEscalationStore`] | `deskhand-core` |
/// | `SqliteEscalationStore` | `deskhand` |
#[async_trait]
pub trait EscalationStore: Send + Sync {
    /// Short backend label for logs (e.g. `"sqlite"`).
    fn backend(&self) -> &str;

    /// Persist one record. Idempotency is not required.
    async fn persist(&self, record: &EscalationRecord) -> Result<()>;
}

/// Best-effort front for an [`EscalationStore`].
#[derive(Clone)]
pub struct EscalationRecorder {
    store: Arc<dyn EscalationStore>,
}

impl EscalationRecorder {
    pub fn new(store: Arc<dyn EscalationStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &str {
        self.store.backend()
    }

    /// Hand a record to the store. Failures are logged here and returned
    /// for the caller to pick a reply; they never abort the turn.
    pub async fn record(&self, record: &EscalationRecord) -> Result<(), RecordError> {
        match self.store.persist(record).await {
            Ok(()) => {
                tracing::info!(
                    backend = self.store.backend(),
                    at = %record.timestamp,
                    "escalation recorded"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    backend = self.store.backend(),
                    error = %format!("{:#}", e),
                    "escalation could not be recorded"
                );
                Err(RecordError::Storage(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::InMemoryEscalationStore;
    use super::*;

    struct BrokenStore;

    #[async_trait]
    impl EscalationStore for BrokenStore {
        fn backend(&self) -> &str {
            "broken"
        }
        async fn persist(&self, _record: &EscalationRecord) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[tokio::test]
    async fn test_record_success() {
        let store = Arc::new(InMemoryEscalationStore::new());
        let recorder = EscalationRecorder::new(store.clone());
        let rec = EscalationRecord::new("Ana", "ana@x.com", "refund policy");
        recorder.record(&rec).await.unwrap();
        assert_eq!(store.records(), vec![rec]);
        assert_eq!(recorder.backend(), "memory");
    }

    #[tokio::test]
    async fn test_record_failure_is_reported_not_thrown() {
        let recorder = EscalationRecorder::new(Arc::new(BrokenStore));
        let rec = EscalationRecord::new("Ana", "ana@x.com", "refund policy");
        let err = recorder.record(&rec).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }
}
