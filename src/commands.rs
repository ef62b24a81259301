//! CLI command implementations.
//!
//! Each `run_*` function backs one `deskhand` subcommand and prints
//! human-readable output to stdout.

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use deskhand_core::index::IndexSlot;

use crate::bootstrap::{self, assemble_engine, build_into, Collaborators};
use crate::completion::create_completer;
use crate::config::Config;
use crate::conversation::{ConversationState, Intent, TurnReply, TurnRequest};
use crate::embedding::create_embedder;
use crate::pipeline::AnswerPipeline;
use crate::sqlite_store::SqliteEscalationStore;

const PREVIEW_CHARS: usize = 120;

/// `deskhand chunks`: chunk the corpus and print a summary.
pub fn run_chunks(config: &Config, show: usize) -> Result<()> {
    let chunks = bootstrap::prepare_chunks(config)?;
    let total_chars: usize = chunks.iter().map(|c| c.text.chars().count()).sum();

    println!("Corpus: {}", config.corpus.path.display());
    println!("Chunks: {}", chunks.len());
    println!(
        "Target size: {}  Overlap: {}",
        config.chunking.target_size, config.chunking.overlap
    );
    if !chunks.is_empty() {
        println!("Average chunk: {} chars", total_chars / chunks.len());
    }

    for chunk in chunks.iter().take(show) {
        let preview: String = chunk.text.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if chunk.text.chars().count() > PREVIEW_CHARS {
            "…"
        } else {
            ""
        };
        println!();
        println!(
            "#{} (offset {}, {} chars)",
            chunk.id,
            chunk.source_offset,
            chunk.text.chars().count()
        );
        println!("  {}{}", preview.replace('\n', " "), ellipsis);
    }

    Ok(())
}

/// `deskhand ask`: answer one question through the full pipeline.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let query = deskhand_core::normalize::normalize(question);
    if query.is_empty() {
        bail!("question must not be empty");
    }

    let embedder = create_embedder(&config.embedding)?;
    let completer = create_completer(&config.completion)?;
    let slot = Arc::new(IndexSlot::new());
    build_into(config, embedder.as_ref(), &slot).await?;

    let pipeline = AnswerPipeline::new(slot, embedder, completer, config.retrieval.top_k);
    let answer = pipeline.answer(&query).await?;

    println!("{}", answer.text);
    if !answer.grounded {
        println!();
        println!("(no grounded answer; in a conversation this starts a contact request)");
    }
    Ok(())
}

/// `deskhand chat`: an interactive session on stdin.
///
/// When the assistant asks for contact details the user is prompted for a
/// name and email; leaving the name blank skips the hand-off.
pub async fn run_chat(config: &Config) -> Result<()> {
    let collaborators = Collaborators::from_config(config).await?;
    let (engine, slot) = assemble_engine(config, &collaborators);
    eprintln!("Building index…");
    build_into(config, collaborators.embedder.as_ref(), &slot).await?;

    let intent_name = |intent: Intent| -> Result<String> {
        engine
            .intents()
            .name_of(intent)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("no intent name configured for {:?}", intent))
    };
    let welcome = intent_name(Intent::Welcome)?;
    let answer = intent_name(Intent::Answer)?;
    let collect = intent_name(Intent::CollectInfo)?;

    let session_id = format!("cli-{}", std::process::id());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let reply = engine
        .handle_turn(TurnRequest::new(&welcome, &session_id, ""))
        .await?;
    println!("{}", reply.reply);

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }

        let reply = engine
            .handle_turn(TurnRequest::new(&answer, &session_id, line))
            .await?;
        println!("{}", reply.reply);

        if !awaiting_contact(&reply) {
            continue;
        }

        stdout.write_all(b"Name (leave blank to skip): ").await?;
        stdout.flush().await?;
        let name = lines.next_line().await?.unwrap_or_default();
        if name.trim().is_empty() {
            continue;
        }
        stdout.write_all(b"Email: ").await?;
        stdout.flush().await?;
        let email = lines.next_line().await?.unwrap_or_default();

        let request = TurnRequest::new(&collect, &session_id, "")
            .with_parameter("name", name.trim())
            .with_parameter("email", email.trim());
        let reply = engine.handle_turn(request).await?;
        println!("{}", reply.reply);
    }

    Ok(())
}

fn awaiting_contact(reply: &TurnReply) -> bool {
    matches!(
        reply.context.as_ref().map(|c| &c.state),
        Some(ConversationState::AwaitingContactInfo { .. })
    )
}

/// `deskhand escalations`: list recorded hand-offs, newest first.
pub async fn run_escalations(config: &Config, limit: i64) -> Result<()> {
    if config.escalation.store != "sqlite" {
        bail!(
            "escalation.store is '{}'; only the sqlite store keeps records between runs",
            config.escalation.store
        );
    }

    let store = SqliteEscalationStore::open(config).await?;
    let records = store.list_recent(limit).await?;
    store.close().await;

    if records.is_empty() {
        println!("No escalations recorded.");
        return Ok(());
    }

    println!("{:<20}  {:<24}  {:<32}  QUERY", "WHEN", "NAME", "EMAIL");
    for record in records {
        println!(
            "{:<20}  {:<24}  {:<32}  {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.name,
            record.email,
            record.query
        );
    }
    Ok(())
}
