mod common;

use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{BrokenStore, Harness, ScriptedCompleter, CLASSES_ANSWER, HOURS_ANSWER, PARKING_ANSWER};
use deskhand::bootstrap::{assemble_engine, build_into};
use deskhand::config::RepliesConfig;
use deskhand::conversation::{
    ConversationContext, ConversationEngine, ConversationState, TurnError, TurnRequest,
};

const VISA_QUESTION: &str = "Can you help with my visa appeal?";

async fn ready_engine(h: &Harness) -> Arc<ConversationEngine> {
    let (engine, slot) = assemble_engine(&h.config, &h.collaborators());
    build_into(&h.config, h.embedder.as_ref(), &slot).await.unwrap();
    engine
}

fn replies() -> RepliesConfig {
    RepliesConfig::default()
}

fn ask(session: &str, text: &str) -> TurnRequest {
    TurnRequest::new("Ask Question", session, text)
}

fn contact(session: &str, name: &str, email: &str) -> TurnRequest {
    TurnRequest::new("Collect Contact Info", session, "")
        .with_parameter("name", name)
        .with_parameter("email", email)
}

#[tokio::test]
async fn test_grounded_answer_stores_no_context() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    let reply = engine
        .handle_turn(ask("s1", "What are your office hours?"))
        .await
        .unwrap();
    assert_eq!(reply.reply, HOURS_ANSWER);
    assert!(reply.context.is_none());
    assert!(engine.sessions().peek("s1").await.is_none());
}

#[tokio::test]
async fn test_refusal_then_contact_info_records_escalation() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    let reply = engine.handle_turn(ask("s1", VISA_QUESTION)).await.unwrap();
    assert_eq!(reply.reply, replies().contact_request);
    assert_eq!(
        reply.context,
        Some(ConversationContext::awaiting("s1", VISA_QUESTION, 2))
    );

    let reply = engine
        .handle_turn(contact("s1", "Ana Lima", "ana@example.com"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().acknowledgement);
    assert!(reply.context.is_none());

    let records = h.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "Ana Lima");
    assert_eq!(records[0].email, "ana@example.com");
    assert_eq!(records[0].query, VISA_QUESTION);
}

#[tokio::test]
async fn test_escalation_keeps_the_question_verbatim() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;
    let question = "What's your refund policy for a $50 order? (ref #A-7 @ 10%)";

    let reply = engine
        .handle_turn(ask("s1", &format!("  {}\n", question)))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().contact_request);
    assert_eq!(
        reply.context,
        Some(ConversationContext::awaiting("s1", question, 2))
    );

    engine
        .handle_turn(contact("s1", "Ana", "ana@example.com"))
        .await
        .unwrap();
    let records = h.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].query, question);
}

#[tokio::test]
async fn test_context_expires_after_two_other_turns() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    engine.handle_turn(ask("s1", VISA_QUESTION)).await.unwrap();

    let reply = engine
        .handle_turn(ask("s1", "When are the English classes?"))
        .await
        .unwrap();
    assert_eq!(reply.reply, CLASSES_ANSWER);
    assert_eq!(
        reply.context,
        Some(ConversationContext::awaiting("s1", VISA_QUESTION, 1))
    );

    let reply = engine
        .handle_turn(ask("s1", "Is there parking?"))
        .await
        .unwrap();
    assert_eq!(reply.reply, PARKING_ANSWER);
    assert!(reply.context.is_none());

    let reply = engine
        .handle_turn(contact("s1", "Ana", "ana@example.com"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().nothing_pending);
    assert!(h.records.is_empty());
}

#[tokio::test]
async fn test_second_refusal_restarts_the_wait() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    engine.handle_turn(ask("s1", VISA_QUESTION)).await.unwrap();
    let reply = engine
        .handle_turn(ask("s1", "What is your refund policy?"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().contact_request);
    assert_eq!(
        reply.context,
        Some(ConversationContext::awaiting(
            "s1",
            "What is your refund policy?",
            2
        ))
    );
}

#[tokio::test]
async fn test_welcome_never_touches_context() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    let reply = engine
        .handle_turn(TurnRequest::new("Default Welcome Intent", "s1", "hi"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().welcome);
    assert!(reply.context.is_none());

    engine.handle_turn(ask("s1", VISA_QUESTION)).await.unwrap();
    let reply = engine
        .handle_turn(TurnRequest::new("welcome", "s1", "hello again"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().welcome);
    assert_eq!(
        reply.context,
        Some(ConversationContext::awaiting("s1", VISA_QUESTION, 2))
    );
    assert_eq!(h.completer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sessions_do_not_share_context() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    engine.handle_turn(ask("alice", VISA_QUESTION)).await.unwrap();

    let reply = engine
        .handle_turn(contact("bob", "Bob", "bob@example.com"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().nothing_pending);
    assert!(h.records.is_empty());

    assert_eq!(
        engine.sessions().peek("alice").await,
        Some(ConversationContext::awaiting("alice", VISA_QUESTION, 2))
    );
}

#[tokio::test]
async fn test_storage_failure_still_clears_context() {
    let h = Harness::new();
    let (engine, slot) = assemble_engine(&h.config, &h.collaborators_with_store(Arc::new(BrokenStore)));
    build_into(&h.config, h.embedder.as_ref(), &slot).await.unwrap();

    engine.handle_turn(ask("s1", VISA_QUESTION)).await.unwrap();
    let reply = engine
        .handle_turn(contact("s1", "Ana", "ana@example.com"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().record_failed);
    assert!(reply.context.is_none());
    assert!(engine.sessions().peek("s1").await.is_none());
}

#[tokio::test]
async fn test_completion_failure_gives_apology_and_stays_answering() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;
    h.completer.fail.store(true, Ordering::SeqCst);

    let reply = engine
        .handle_turn(ask("s1", "What are your office hours?"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().synthesis_failed);
    assert!(reply.context.is_none());
}

#[tokio::test]
async fn test_embedding_failure_gives_apology() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;
    h.embedder.fail.store(true, Ordering::SeqCst);

    let reply = engine
        .handle_turn(ask("s1", "What are your office hours?"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().synthesis_failed);
    assert_eq!(h.completer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_not_ready_before_index_build() {
    let h = Harness::new();
    let (engine, _slot) = assemble_engine(&h.config, &h.collaborators());

    let reply = engine
        .handle_turn(ask("s1", "What are your office hours?"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().not_ready);
    assert!(reply.context.is_none());
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.completer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_query_skips_collaborators() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;
    let embed_calls = h.embedder.calls.load(Ordering::SeqCst);

    let reply = engine.handle_turn(ask("s1", "  #$%  ")).await.unwrap();
    assert_eq!(reply.reply, replies().empty_query);

    let mut request = ask("s1", "");
    request.text = json!({"not": "text"});
    let reply = engine.handle_turn(request).await.unwrap();
    assert_eq!(reply.reply, replies().empty_query);

    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), embed_calls);
    assert_eq!(h.completer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_intent_and_missing_session_rejected() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    let err = engine
        .handle_turn(TurnRequest::new("Order Pizza", "s1", "pepperoni"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::UnknownIntent(name) if name == "Order Pizza"));

    let err = engine.handle_turn(ask("   ", "hours?")).await.unwrap_err();
    assert!(matches!(err, TurnError::MissingSession));
}

#[tokio::test]
async fn test_incomplete_contact_info_reprompts_and_counts() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    engine.handle_turn(ask("s1", VISA_QUESTION)).await.unwrap();

    let request = TurnRequest::new("Collect Contact Info", "s1", "").with_parameter("name", "Ana");
    let reply = engine.handle_turn(request).await.unwrap();
    assert_eq!(reply.reply, replies().contact_request);
    assert_eq!(
        reply.context,
        Some(ConversationContext::awaiting("s1", VISA_QUESTION, 1))
    );

    let reply = engine
        .handle_turn(contact("s1", "Ana", "ana@example.com"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().acknowledgement);
    assert_eq!(h.records.len(), 1);
}

#[tokio::test]
async fn test_prior_context_adopted_when_store_is_empty() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    let mut request = contact("s9", "Ana", "ana@example.com");
    request.context = Some(ConversationContext::awaiting("s9", "visa renewal", 1));
    let reply = engine.handle_turn(request).await.unwrap();
    assert_eq!(reply.reply, replies().acknowledgement);
    assert_eq!(h.records.records()[0].query, "visa renewal");
}

#[tokio::test]
async fn test_prior_context_cannot_extend_the_wait() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    let mut request = ask("s1", "What are your office hours?");
    request.context = Some(ConversationContext::awaiting("s1", "refund policy", 1000));
    let reply = engine.handle_turn(request).await.unwrap();
    assert_eq!(reply.reply, HOURS_ANSWER);
    assert_eq!(
        engine.sessions().peek("s1").await,
        Some(ConversationContext::awaiting("s1", "refund policy", 1))
    );

    engine
        .handle_turn(ask("s1", "Is there parking?"))
        .await
        .unwrap();
    assert!(engine.sessions().peek("s1").await.is_none());

    let reply = engine
        .handle_turn(contact("s1", "Ana", "ana@example.com"))
        .await
        .unwrap();
    assert_eq!(reply.reply, replies().nothing_pending);
    assert!(h.records.is_empty());
}

#[tokio::test]
async fn test_prior_context_ignored_when_store_has_entry() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    engine.handle_turn(ask("s1", VISA_QUESTION)).await.unwrap();

    let mut request = contact("s1", "Ana", "ana@example.com");
    request.context = Some(ConversationContext::awaiting("s1", "something else", 2));
    engine.handle_turn(request).await.unwrap();
    assert_eq!(h.records.records()[0].query, VISA_QUESTION);
}

#[tokio::test]
async fn test_prior_context_for_other_session_ignored() {
    let h = Harness::new();
    let engine = ready_engine(&h).await;

    let mut request = contact("s1", "Ana", "ana@example.com");
    request.context = Some(ConversationContext::awaiting("s2", "visa renewal", 2));
    let reply = engine.handle_turn(request).await.unwrap();
    assert_eq!(reply.reply, replies().nothing_pending);
    assert!(h.records.is_empty());
}

#[tokio::test]
async fn test_same_session_turns_are_serialized() {
    let h = Harness::with_completer(ScriptedCompleter::with_delay(Duration::from_millis(40)));
    let engine = ready_engine(&h).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.handle_turn(ask("shared", VISA_QUESTION)).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.completer.max_in_flight.load(Ordering::SeqCst), 1);
    let context = engine.sessions().peek("shared").await.unwrap();
    assert!(matches!(
        context.state,
        ConversationState::AwaitingContactInfo { remaining_turns: 2, .. }
    ));
}

#[tokio::test]
async fn test_different_sessions_run_concurrently() {
    let h = Harness::with_completer(ScriptedCompleter::with_delay(Duration::from_millis(100)));
    let engine = ready_engine(&h).await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .handle_turn(ask(&format!("s{}", i), "What are your office hours?"))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().reply, HOURS_ANSWER);
    }

    assert!(h.completer.max_in_flight.load(Ordering::SeqCst) > 1);
}
