//! Completion provider implementations.
//!
//! - **[`OpenAICompleter`]** calls `POST /v1/chat/completions` with the
//!   prompt as a single user message.
//! - **[`OllamaCompleter`]** calls `POST /api/generate` with `stream: false`.
//!
//! Both are deterministic by default (`temperature = 0.0`) and retry
//! through [`crate::http::post_json_with_retry`].

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use deskhand_core::synthesize::CompletionProvider;

use crate::config::{CompletionConfig, ConfigError};
use crate::http::{self, JsonEndpoint};

pub struct OpenAICompleter {
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    url: String,
    client: reqwest::Client,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingCredential("OPENAI_API_KEY"))?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            url: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let endpoint = JsonEndpoint {
            label: "OpenAI",
            url: self.url.clone(),
            bearer: Some(&self.api_key),
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        let json = http::post_json_with_retry(&self.client, &endpoint, &body).await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

pub struct OllamaCompleter {
    model: String,
    url: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model: config.model.clone(),
            url: format!("{}/api/generate", base.trim_end_matches('/')),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let endpoint = JsonEndpoint {
            label: "Ollama",
            url: self.url.clone(),
            bearer: None,
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        let json = http::post_json_with_retry(&self.client, &endpoint, &body).await?;
        parse_generate_response(&json)
    }
}

fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

/// Create the [`CompletionProvider`] named by `completion.provider`.
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAICompleter::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompleter::new(config)?)),
        other => Err(ConfigError::UnknownProvider {
            kind: "completion",
            name: other.to_string(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "We open at 9."}}]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "We open at 9.");
    }

    #[test]
    fn test_parse_chat_response_missing_content() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn test_parse_generate_response() {
        let json = serde_json::json!({"model": "llama3", "response": "Yes.", "done": true});
        assert_eq!(parse_generate_response(&json).unwrap(), "Yes.");
    }

    #[test]
    fn test_ollama_url_joins_cleanly() {
        let config = CompletionConfig {
            provider: "ollama".to_string(),
            url: Some("http://gpu-box:11434/".to_string()),
            ..CompletionConfig::default()
        };
        let completer = OllamaCompleter::new(&config).unwrap();
        assert_eq!(completer.url, "http://gpu-box:11434/api/generate");
    }

    #[test]
    fn test_unknown_provider() {
        let config = CompletionConfig {
            provider: "magic".to_string(),
            ..CompletionConfig::default()
        };
        let err = create_completer(&config).err().unwrap();
        assert!(err.to_string().contains("unknown completion provider"));
    }
}
