//! Conversation state machine.
//!
//! Each turn arrives as a [`TurnRequest`] (intent name, session id, free
//! text, parameters, optional prior context) and leaves as a
//! [`TurnReply`] (reply text plus the session's context after the turn).
//!
//! ```text
//!              refusal                       contact info
//! Answering ─────────────▶ AwaitingContactInfo ─────────────▶ Answering
//!     ▲                        │     (record escalation)
//!     └────────────────────────┘
//!       remaining_turns hits 0
//! ```
//!
//! Welcome turns never touch the context. Recoverable failures (index not
//! ready, embedding or completion down, storage down) become fixed replies.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use deskhand_core::models::EscalationRecord;
use deskhand_core::normalize::normalize_value;
use deskhand_core::store::{EscalationRecorder, EscalationStore};

use crate::config::{Config, IntentsConfig, RepliesConfig};
use crate::pipeline::AnswerPipeline;
use crate::session::{SessionLease, SessionStore};

/// Maximum query characters written to logs.
const LOG_QUERY_CHARS: usize = 80;

/// The closed set of intents the state machine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Welcome,
    Answer,
    CollectInfo,
}

/// Channel intent names → [`Intent`].
#[derive(Debug, Clone)]
pub struct IntentNames {
    names: HashMap<String, Intent>,
    order: Vec<(String, Intent)>,
}

impl IntentNames {
    pub fn from_config(config: &IntentsConfig) -> Self {
        let mut names = HashMap::new();
        let mut order = Vec::new();
        for (intent, list) in [
            (Intent::Welcome, &config.welcome),
            (Intent::Answer, &config.answer),
            (Intent::CollectInfo, &config.collect_info),
        ] {
            for name in list {
                names.insert(name.clone(), intent);
                order.push((name.clone(), intent));
            }
        }
        Self { names, order }
    }

    pub fn resolve(&self, name: &str) -> Option<Intent> {
        self.names.get(name).copied()
    }

    /// The first configured channel name for `intent`.
    pub fn name_of(&self, intent: Intent) -> Option<&str> {
        self.order
            .iter()
            .find(|(_, i)| *i == intent)
            .map(|(name, _)| name.as_str())
    }
}

impl Default for IntentNames {
    fn default() -> Self {
        Self::from_config(&IntentsConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    Answering,
    AwaitingContactInfo {
        original_query: String,
        remaining_turns: u32,
    },
}

/// Per-session context. Only stored while awaiting contact info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_id: String,
    #[serde(flatten)]
    pub state: ConversationState,
}

impl ConversationContext {
    pub fn awaiting(
        session_id: impl Into<String>,
        original_query: impl Into<String>,
        remaining_turns: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            state: ConversationState::AwaitingContactInfo {
                original_query: original_query.into(),
                remaining_turns,
            },
        }
    }

    /// An awaiting context with a query and turns left.
    fn is_live(&self) -> bool {
        match &self.state {
            ConversationState::Answering => false,
            ConversationState::AwaitingContactInfo {
                original_query,
                remaining_turns,
            } => !original_query.is_empty() && *remaining_turns > 0,
        }
    }

    /// The same context with no more than `max_turns` left.
    fn capped(mut self, max_turns: u32) -> Self {
        if let ConversationState::AwaitingContactInfo {
            remaining_turns, ..
        } = &mut self.state
        {
            *remaining_turns = (*remaining_turns).min(max_turns);
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub intent: String,
    pub session_id: String,
    #[serde(default)]
    pub text: Value,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub context: Option<ConversationContext>,
}

impl TurnRequest {
    pub fn new(intent: impl Into<String>, session_id: impl Into<String>, text: &str) -> Self {
        Self {
            intent: intent.into(),
            session_id: session_id.into(),
            text: Value::String(text.to_string()),
            parameters: Map::new(),
            context: None,
        }
    }

    pub fn with_parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub context: Option<ConversationContext>,
}

/// A turn the engine refuses to process at all.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("unknown intent '{0}'")]
    UnknownIntent(String),
    #[error("session_id must not be empty")]
    MissingSession,
}

pub struct ConversationEngine {
    pipeline: AnswerPipeline,
    recorder: EscalationRecorder,
    sessions: SessionStore,
    intents: IntentNames,
    replies: RepliesConfig,
    contact_turns: u32,
}

impl ConversationEngine {
    pub fn new(config: &Config, pipeline: AnswerPipeline, store: Arc<dyn EscalationStore>) -> Self {
        Self {
            pipeline,
            recorder: EscalationRecorder::new(store),
            sessions: SessionStore::new(),
            intents: IntentNames::from_config(&config.intents),
            replies: config.replies.clone(),
            contact_turns: config.conversation.contact_turns.max(1),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn pipeline(&self) -> &AnswerPipeline {
        &self.pipeline
    }

    pub fn intents(&self) -> &IntentNames {
        &self.intents
    }

    /// Apply one turn to its session and produce the reply.
    pub async fn handle_turn(&self, request: TurnRequest) -> Result<TurnReply, TurnError> {
        let intent = self
            .intents
            .resolve(&request.intent)
            .ok_or_else(|| TurnError::UnknownIntent(request.intent.clone()))?;
        let session_id = request.session_id.trim();
        if session_id.is_empty() {
            return Err(TurnError::MissingSession);
        }

        let raw = raw_text(&request.text);
        let query = normalize_value(&request.text);
        tracing::info!(
            session_id,
            intent = ?intent,
            query = %truncate(&query, LOG_QUERY_CHARS),
            "turn received"
        );

        let mut lease = self.sessions.lock(session_id).await;

        if intent != Intent::Welcome && lease.context().is_none() {
            if let Some(prior) = request.context {
                if prior.session_id == session_id && prior.is_live() {
                    tracing::debug!(session_id, "adopting channel-supplied context");
                    lease.set(Some(prior.capped(self.contact_turns)));
                }
            }
        }

        let reply = match intent {
            Intent::Welcome => self.replies.welcome.clone(),
            Intent::Answer => self.answer_turn(&mut lease, &query, &raw).await,
            Intent::CollectInfo => {
                self.collect_info_turn(&mut lease, &request.parameters, &query, &raw)
                    .await
            }
        };

        Ok(TurnReply {
            reply,
            context: lease.context().cloned(),
        })
    }

    /// Spend one waiting turn, then answer `query` from the corpus.
    async fn answer_turn(&self, lease: &mut SessionLease, query: &str, raw: &str) -> String {
        self.spend_waiting_turn(lease);
        self.answer_and_transition(lease, query, raw).await
    }

    /// Answer the normalized `query`; on a refusal the session waits for
    /// contact info under the user's own wording, `raw`.
    async fn answer_and_transition(
        &self,
        lease: &mut SessionLease,
        query: &str,
        raw: &str,
    ) -> String {
        if query.is_empty() {
            return self.replies.empty_query.clone();
        }

        match self.pipeline.answer(query).await {
            Ok(answer) if answer.grounded => answer.text,
            Ok(_) => {
                tracing::info!(
                    session_id = lease.session_id(),
                    query = %truncate(query, LOG_QUERY_CHARS),
                    remaining_turns = self.contact_turns,
                    "no grounded answer; awaiting contact info"
                );
                let context =
                    ConversationContext::awaiting(lease.session_id(), raw, self.contact_turns);
                lease.set(Some(context));
                self.replies.contact_request.clone()
            }
            Err(e) if e.is_not_ready() => {
                tracing::warn!(session_id = lease.session_id(), "index not ready");
                self.replies.not_ready.clone()
            }
            Err(e) => {
                tracing::warn!(
                    session_id = lease.session_id(),
                    query = %truncate(query, LOG_QUERY_CHARS),
                    error = %e,
                    "answering failed"
                );
                self.replies.synthesis_failed.clone()
            }
        }
    }

    async fn collect_info_turn(
        &self,
        lease: &mut SessionLease,
        parameters: &Map<String, Value>,
        query: &str,
        raw: &str,
    ) -> String {
        let Some(ConversationContext {
            state: ConversationState::AwaitingContactInfo { original_query, .. },
            ..
        }) = lease.context().cloned()
        else {
            return self.replies.nothing_pending.clone();
        };

        let Some((name, email)) = contact_details(parameters) else {
            // Counts as a non-contact turn.
            if self.spend_waiting_turn(lease) {
                return self.replies.contact_request.clone();
            }
            return self.answer_and_transition(lease, query, raw).await;
        };

        lease.set(None);
        let record = EscalationRecord::new(name, email, original_query);
        match self.recorder.record(&record).await {
            Ok(()) => self.replies.acknowledgement.clone(),
            Err(_) => self.replies.record_failed.clone(),
        }
    }

    /// Decrement an awaiting context, discarding it at zero. Returns whether
    /// the session is still awaiting contact info afterwards.
    fn spend_waiting_turn(&self, lease: &mut SessionLease) -> bool {
        let Some(context) = lease.take() else {
            return false;
        };
        match context.state {
            ConversationState::AwaitingContactInfo {
                original_query,
                remaining_turns,
            } => {
                let remaining = remaining_turns.saturating_sub(1);
                if remaining > 0 {
                    lease.set(Some(ConversationContext::awaiting(
                        context.session_id,
                        original_query,
                        remaining,
                    )));
                    true
                } else {
                    tracing::info!(
                        session_id = lease.session_id(),
                        "contact request expired"
                    );
                    false
                }
            }
            ConversationState::Answering => false,
        }
    }
}

/// `name` and `email` from the turn parameters, if both are usable.
///
/// A name may arrive as a plain string or as an object with a `name`
/// field. The email is kept verbatim apart from trimming.
fn contact_details(parameters: &Map<String, Value>) -> Option<(String, String)> {
    let name = match parameters.get("name")? {
        Value::Object(inner) => inner.get("name").map(normalize_value)?,
        other => normalize_value(other),
    };
    let email = parameters.get("email")?.as_str()?.trim().to_string();
    if name.is_empty() || !email.contains('@') || email.chars().any(char::is_whitespace) {
        return None;
    }
    Some((name, email))
}

/// The turn text as the user typed it, minus surrounding whitespace.
fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
