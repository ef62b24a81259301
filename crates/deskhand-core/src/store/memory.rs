//! In-memory [`EscalationStore`] implementation for tests and ephemeral deployments.
//!
//! Records live in a `Vec` behind `std::sync::RwLock` and are lost when
//! the process exits.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::EscalationRecord;

use super::EscalationStore;

/// In-memory escalation store.
pub struct InMemoryEscalationStore {
    records: RwLock<Vec<EscalationRecord>>,
}

impl InMemoryEscalationStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn records(&self) -> Vec<EscalationRecord> {
        self.records
            .read()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEscalationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscalationStore for InMemoryEscalationStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn persist(&self, record: &EscalationRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow::anyhow!("escalation store lock poisoned"))?;
        records.push(record.clone());
        Ok(())
    }
}
