//! # Deskhand Core
//!
//! Shared, runtime-agnostic logic for Deskhand: text normalization,
//! overlapping chunking, the in-memory vector index, retrieval, prompt
//! guardrails, answer synthesis, and the collaborator traits (embedding,
//! completion, escalation storage) that the application crate implements.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Everything
//! that talks to the outside world goes through a trait defined here.
//!
//! ## Pipeline
//!
//! ```text
//! Document ──▶ chunk ──▶ VectorIndex::build ──▶ IndexSlot (read-only)
//!                                                    │
//! query ──▶ normalize ──▶ retrieve ◀─────────────────┘
//!                           │
//!                           ▼
//!                    prompt::assemble ──▶ synthesize ──▶ Answer
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod retrieve;
pub mod store;
pub mod synthesize;
