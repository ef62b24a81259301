//! Answer synthesis through the completion collaborator.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::SynthesisError;
use crate::normalize::normalize;
use crate::prompt::is_insufficient;

/// Trait for language-model completion backends.
///
/// Retry and timeout policy belong to the implementation; callers make
/// exactly one call per answer.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;
    /// Return the model's text output for `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// A normalized model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    /// False when the model gave the insufficient-information refusal.
    pub grounded: bool,
}

/// Send `prompt` to the completion provider and normalize its output.
pub async fn synthesize(
    provider: &dyn CompletionProvider,
    prompt: &str,
) -> Result<Answer, SynthesisError> {
    let raw = provider
        .complete(prompt)
        .await
        .map_err(SynthesisError::Completion)?;
    let text = normalize(&raw);
    let grounded = !is_insufficient(&text);
    Ok(Answer { text, grounded })
}
