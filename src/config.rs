//! TOML configuration.
//!
//! Only `[corpus]` is required; every other section falls back to the
//! defaults below. [`load_config`] parses and validates the file;
//! collaborator constructors raise [`ConfigError`] for problems that only
//! show up when a provider is actually built (e.g. a missing API key).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use deskhand_core::chunk::{ChunkOptions, DEFAULT_OVERLAP, DEFAULT_TARGET_SIZE};
use deskhand_core::index::{DEFAULT_BATCH_SIZE, DEFAULT_TOP_K};
use deskhand_core::prompt;

/// Startup configuration problems. Fatal: the process must not serve traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
    #[error("{0} must be set for provider '{1}'")]
    MissingSetting(&'static str, String),
    #[error("unknown {kind} provider '{name}'")]
    UnknownProvider { kind: &'static str, name: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub intents: IntentsConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkOptions {
        ChunkOptions {
            target_size: self.target_size,
            overlap: self.overlap,
        }
    }
}

fn default_target_size() -> usize {
    DEFAULT_TARGET_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: Some("text-embedding-3-small".to_string()),
            dims: Some(1536),
            url: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_completion_retries")]
    pub max_retries: u32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            url: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            max_retries: default_completion_retries(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_completion_provider() -> String {
    "openai".to_string()
}
fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_completion_retries() -> u32 {
    3
}
fn default_completion_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EscalationConfig {
    #[serde(default = "default_store")]
    pub store: String,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
        }
    }
}

fn default_store() -> String {
    "sqlite".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/deskhand.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationConfig {
    /// Non-contact turns tolerated while waiting for contact info.
    #[serde(default = "default_contact_turns")]
    pub contact_turns: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            contact_turns: default_contact_turns(),
        }
    }
}

fn default_contact_turns() -> u32 {
    2
}

/// Channel intent names mapped onto the closed [`Intent`](crate::conversation::Intent) set.
#[derive(Debug, Deserialize, Clone)]
pub struct IntentsConfig {
    #[serde(default = "default_welcome_intents")]
    pub welcome: Vec<String>,
    #[serde(default = "default_answer_intents")]
    pub answer: Vec<String>,
    #[serde(default = "default_collect_info_intents")]
    pub collect_info: Vec<String>,
}

impl Default for IntentsConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome_intents(),
            answer: default_answer_intents(),
            collect_info: default_collect_info_intents(),
        }
    }
}

fn default_welcome_intents() -> Vec<String> {
    vec!["Default Welcome Intent".to_string(), "welcome".to_string()]
}
fn default_answer_intents() -> Vec<String> {
    vec![
        "Default Fallback Intent".to_string(),
        "Ask Question".to_string(),
        "answer".to_string(),
    ]
}
fn default_collect_info_intents() -> Vec<String> {
    vec!["Collect Contact Info".to_string(), "collect_info".to_string()]
}

/// Fixed conversational replies.
///
/// The refusal and legal-referral sentences are not configurable: they are
/// part of the prompt contract in `deskhand_core::prompt`.
#[derive(Debug, Deserialize, Clone)]
pub struct RepliesConfig {
    #[serde(default = "default_welcome")]
    pub welcome: String,
    #[serde(default = "default_contact_request")]
    pub contact_request: String,
    #[serde(default = "default_acknowledgement")]
    pub acknowledgement: String,
    #[serde(default = "default_record_failed")]
    pub record_failed: String,
    #[serde(default = "default_synthesis_failed")]
    pub synthesis_failed: String,
    #[serde(default = "default_not_ready")]
    pub not_ready: String,
    #[serde(default = "default_empty_query")]
    pub empty_query: String,
    #[serde(default = "default_nothing_pending")]
    pub nothing_pending: String,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            contact_request: default_contact_request(),
            acknowledgement: default_acknowledgement(),
            record_failed: default_record_failed(),
            synthesis_failed: default_synthesis_failed(),
            not_ready: default_not_ready(),
            empty_query: default_empty_query(),
            nothing_pending: default_nothing_pending(),
        }
    }
}

fn default_welcome() -> String {
    "Hi! I can answer questions about our services. What would you like to know?".to_string()
}
fn default_contact_request() -> String {
    format!(
        "{} Please share your name and email address and someone from our team will get back to you.",
        prompt::INSUFFICIENT_INFO
    )
}
fn default_acknowledgement() -> String {
    "Thank you! We have received your details and someone from our team will contact you soon."
        .to_string()
}
fn default_record_failed() -> String {
    "Sorry, we could not save your details right now. Please try again later.".to_string()
}
fn default_synthesis_failed() -> String {
    "Sorry, I am having trouble answering right now. Please try again in a moment.".to_string()
}
fn default_not_ready() -> String {
    "I am still getting ready. Please try again in a moment.".to_string()
}
fn default_empty_query() -> String {
    "Could you rephrase your question?".to_string()
}
fn default_nothing_pending() -> String {
    "Thanks! Is there anything you would like to ask?".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

impl Config {
    /// Stable identifier for the corpus: `[corpus].id` or the file stem.
    pub fn corpus_id(&self) -> String {
        self.corpus.id.clone().unwrap_or_else(|| {
            self.corpus
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "corpus".to_string())
        })
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.target_size == 0 {
        anyhow::bail!("chunking.target_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.target_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.target_size ({})",
            config.chunking.overlap,
            config.chunking.target_size
        );
    }

    // Retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Completion
    match config.completion.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    // Escalation
    match config.escalation.store.as_str() {
        "sqlite" | "memory" => {}
        other => anyhow::bail!(
            "Unknown escalation store: '{}'. Must be sqlite or memory.",
            other
        ),
    }

    // Conversation
    if config.conversation.contact_turns < 1 {
        anyhow::bail!("conversation.contact_turns must be >= 1");
    }

    // Intents: each intent needs a name, and a name maps to one intent only
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (kind, names) in [
        ("welcome", &config.intents.welcome),
        ("answer", &config.intents.answer),
        ("collect_info", &config.intents.collect_info),
    ] {
        if names.is_empty() {
            anyhow::bail!("intents.{} must list at least one intent name", kind);
        }
        for name in names {
            if let Some(previous) = seen.insert(name.as_str(), kind) {
                if previous != kind {
                    anyhow::bail!(
                        "intent name '{}' is listed under both intents.{} and intents.{}",
                        name,
                        previous,
                        kind
                    );
                }
            }
        }
    }

    // Logging
    match config.logging.format.as_str() {
        "compact" | "pretty" | "json" => {}
        other => anyhow::bail!(
            "Unknown logging format: '{}'. Must be compact, pretty, or json.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[corpus]\npath = \"./data/handbook.pdf\"\n").unwrap();
        assert_eq!(config.chunking.target_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.conversation.contact_turns, 2);
        assert_eq!(config.escalation.store, "sqlite");
        assert_eq!(config.embedding.provider, "openai");
        assert_eq!(config.corpus_id(), "handbook");
        assert!(config
            .replies
            .contact_request
            .starts_with(prompt::INSUFFICIENT_INFO));
    }

    #[test]
    fn test_overlap_must_be_below_target() {
        let err = parse("[corpus]\npath = \"a.txt\"\n[chunking]\ntarget_size = 100\noverlap = 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("chunking.overlap"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let err = parse("[corpus]\npath = \"a.txt\"\n[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));

        let err = parse("[corpus]\npath = \"a.txt\"\n[completion]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown completion provider"));

        let err = parse("[corpus]\npath = \"a.txt\"\n[escalation]\nstore = \"firebase\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown escalation store"));
    }

    #[test]
    fn test_remote_embedding_requires_dims() {
        let err = parse(
            "[corpus]\npath = \"a.txt\"\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_duplicate_intent_names_rejected() {
        let err = parse(
            "[corpus]\npath = \"a.txt\"\n[intents]\nwelcome = [\"hi\"]\nanswer = [\"hi\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("'hi'"));
    }

    #[test]
    fn test_empty_intent_list_rejected() {
        let err = parse("[corpus]\npath = \"a.txt\"\n[intents]\ncollect_info = []\n").unwrap_err();
        assert!(err.to_string().contains("intents.collect_info"));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = parse(include_str!("../config/deskhand.example.toml")).unwrap();
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_explicit_corpus_id() {
        let config = parse("[corpus]\npath = \"a.txt\"\nid = \"faq-v2\"\n").unwrap();
        assert_eq!(config.corpus_id(), "faq-v2");
    }
}
