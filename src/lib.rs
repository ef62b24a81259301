//! # Deskhand
//!
//! A question-answering assistant grounded in a single reference corpus.
//! Questions the corpus can answer get an answer; questions it cannot
//! start a short contact-collection exchange so a person can follow up.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐
//! │  corpus  │──▶│ chunk+embed │──▶│  IndexSlot   │
//! │ txt/pdf  │   │ (bootstrap) │   │ (read-only)  │
//! └──────────┘   └────────────┘   └──────┬───────┘
//!                                         │
//! POST /turn ──▶ ConversationEngine ──▶ AnswerPipeline ──▶ completion
//!                      │
//!                      └──▶ EscalationRecorder ──▶ SQLite / memory
//! ```
//!
//! The algorithms and collaborator traits live in `deskhand-core`; this
//! crate supplies configuration, the concrete collaborators, the session
//! store, the conversation state machine, the HTTP server, and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and `ConfigError` |
//! | [`corpus`] | Corpus file loading (text, Markdown, PDF) |
//! | [`embedding`] | OpenAI, Ollama, and local embedding providers |
//! | [`completion`] | OpenAI and Ollama completion providers |
//! | [`http`] | Shared JSON POST with retry and backoff |
//! | [`sqlite_store`] | SQLite escalation storage |
//! | [`pipeline`] | Retrieve → assemble → synthesize |
//! | [`session`] | Per-session context store |
//! | [`conversation`] | Conversation state machine |
//! | [`bootstrap`] | Startup wiring and index build |
//! | [`server`] | HTTP turn server |
//! | [`commands`] | CLI command implementations |
//! | [`logging`] | tracing subscriber setup |

pub mod bootstrap;
pub mod commands;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod corpus;
pub mod embedding;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod sqlite_store;
