//! Session-context store.
//!
//! One slot per session id, each behind its own async mutex. A turn holds
//! its session's lease for the whole transition, so two turns for the same
//! session are applied one after the other while turns for different
//! sessions never contend. The map itself is only locked long enough to
//! find or create a slot.
//!
//! Slots whose context has been cleared are dropped from the map when the
//! last lease on them is released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;

use crate::conversation::ConversationContext;

type Slot = Arc<tokio::sync::Mutex<Option<ConversationContext>>>;

#[derive(Default)]
struct Inner {
    sessions: Mutex<HashMap<String, Slot>>,
}

impl Inner {
    fn map(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // A panic while holding this lock cannot leave the map half-updated.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared, cloneable handle to every live session context.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `session_id`'s context.
    pub async fn lock(&self, session_id: &str) -> SessionLease {
        let slot = {
            let mut map = self.inner.map();
            map.entry(session_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
                .clone()
        };
        let guard = slot.clone().lock_owned().await;
        SessionLease {
            session_id: session_id.to_string(),
            guard: Some(guard),
            slot,
            inner: self.inner.clone(),
        }
    }

    /// Copy of the stored context, without creating a slot.
    pub async fn peek(&self, session_id: &str) -> Option<ConversationContext> {
        let slot = self.inner.map().get(session_id).cloned()?;
        let context = slot.lock().await.clone();
        context
    }

    /// Number of sessions currently holding a slot.
    pub fn len(&self) -> usize {
        self.inner.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one session's context for the duration of a turn.
pub struct SessionLease {
    session_id: String,
    guard: Option<OwnedMutexGuard<Option<ConversationContext>>>,
    slot: Slot,
    inner: Arc<Inner>,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn context(&self) -> Option<&ConversationContext> {
        self.guard.as_ref().and_then(|g| g.as_ref())
    }

    pub fn take(&mut self) -> Option<ConversationContext> {
        self.guard.as_mut().and_then(|g| g.take())
    }

    pub fn set(&mut self, context: Option<ConversationContext>) {
        if let Some(guard) = self.guard.as_mut() {
            **guard = context;
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        let cleared = self.context().is_none();
        // Release the session lock before touching the map.
        self.guard.take();
        if !cleared {
            return;
        }
        let mut map = self.inner.map();
        // Map entry + this lease; anything more is a waiter that still needs the slot.
        if Arc::strong_count(&self.slot) == 2 {
            if let Some(current) = map.get(&self.session_id) {
                if Arc::ptr_eq(current, &self.slot) {
                    map.remove(&self.session_id);
                }
            }
        }
    }
}
