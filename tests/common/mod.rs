#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use deskhand::bootstrap::Collaborators;
use deskhand::config::{load_config, Config};
use deskhand_core::embedding::EmbeddingProvider;
use deskhand_core::models::EscalationRecord;
use deskhand_core::prompt;
use deskhand_core::store::memory::InMemoryEscalationStore;
use deskhand_core::store::EscalationStore;
use deskhand_core::synthesize::CompletionProvider;

pub const CORPUS: &str = "Harbor Community Services\n\n\
Our office hours are Monday to Friday, 9 am to 5 pm. We are closed on public holidays.\n\n\
We offer free English classes every Tuesday evening in the main hall.\n\n\
Parking is available behind the building at no charge.";

pub const HOURS_ANSWER: &str = "We are open Monday to Friday, 9 am to 5 pm.";
pub const CLASSES_ANSWER: &str = "Free English classes run every Tuesday evening.";
pub const PARKING_ANSWER: &str = "Free parking is available behind the building.";

const VOCABULARY: &[&str] = &["hours", "open", "classes", "english", "parking", "visa", "refund"];

/// Bag-of-keywords embedder: one dimension per vocabulary word plus a bias.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }
    fn dims(&self) -> usize {
        VOCABULARY.len() + 1
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect();
                v.push(0.1);
                v
            })
            .collect())
    }
}

/// Answers a known topic when both the question and the retrieved context
/// mention it; otherwise gives the refusal.
pub struct ScriptedCompleter {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedCompleter {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompleter {
    fn model_name(&self) -> &str {
        "scripted-test"
    }

    async fn complete(&self, prompt_text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("completion service unavailable");
        }

        let (context, question) = prompt_text
            .rsplit_once("Question: ")
            .unwrap_or((prompt_text, ""));
        let question = question.to_lowercase();
        let context = context.to_lowercase();

        let answer = if question.contains("hours") && context.contains("office hours") {
            HOURS_ANSWER.to_string()
        } else if question.contains("classes") && context.contains("english classes") {
            CLASSES_ANSWER.to_string()
        } else if question.contains("parking") && context.contains("parking") {
            PARKING_ANSWER.to_string()
        } else {
            format!("  {}\n", prompt::refusal())
        };
        Ok(answer)
    }
}

pub struct BrokenStore;

#[async_trait]
impl EscalationStore for BrokenStore {
    fn backend(&self) -> &str {
        "broken"
    }
    async fn persist(&self, _record: &EscalationRecord) -> Result<()> {
        anyhow::bail!("database is locked")
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub config: Config,
    pub embedder: Arc<KeywordEmbedder>,
    pub completer: Arc<ScriptedCompleter>,
    pub records: Arc<InMemoryEscalationStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_completer(ScriptedCompleter::new())
    }

    pub fn with_completer(completer: ScriptedCompleter) -> Self {
        let tmp = TempDir::new().unwrap();
        let config_path = write_config(tmp.path(), "memory");
        let config = load_config(&config_path).unwrap();
        Self {
            tmp,
            config,
            embedder: Arc::new(KeywordEmbedder::new()),
            completer: Arc::new(completer),
            records: Arc::new(InMemoryEscalationStore::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            embedder: self.embedder.clone(),
            completer: self.completer.clone(),
            store: self.records.clone(),
        }
    }

    pub fn collaborators_with_store(&self, store: Arc<dyn EscalationStore>) -> Collaborators {
        Collaborators {
            store,
            ..self.collaborators()
        }
    }
}

/// Write the corpus and a config using the given escalation store; returns the config path.
pub fn write_config(root: &Path, store: &str) -> PathBuf {
    let corpus_path = root.join("services.txt");
    std::fs::write(&corpus_path, CORPUS).unwrap();

    let config_dir = root.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("deskhand.toml");
    let content = format!(
        r#"[corpus]
path = "{corpus}"

[chunking]
target_size = 120
overlap = 20

[retrieval]
top_k = 2

[embedding]
provider = "ollama"
model = "keyword-test"
dims = 8

[escalation]
store = "{store}"

[db]
path = "{root}/data/deskhand.sqlite"

[server]
bind = "127.0.0.1:0"
"#,
        corpus = corpus_path.display(),
        store = store,
        root = root.display(),
    );
    std::fs::write(&config_path, content).unwrap();
    config_path
}
