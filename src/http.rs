//! Shared JSON-over-HTTP call with retry and backoff.
//!
//! Both the embedding and completion clients go through
//! [`post_json_with_retry`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

/// One remote JSON endpoint plus its retry policy.
pub struct JsonEndpoint<'a> {
    /// Human label used in error messages (e.g. `"OpenAI"`).
    pub label: &'a str,
    pub url: String,
    pub bearer: Option<&'a str>,
    pub max_retries: u32,
}

/// Build a client with the given per-request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// POST `body` to the endpoint and return the parsed JSON response.
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    endpoint: &JsonEndpoint<'_>,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=endpoint.max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::debug!(
                label = endpoint.label,
                attempt,
                delay_secs = delay.as_secs(),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = endpoint.bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        endpoint.label,
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("{} API error {}: {}", endpoint.label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "{} connection error ({}): {}",
                    endpoint.label,
                    endpoint.url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", endpoint.label)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let secs: Vec<u64> = (1..=8).map(|a| backoff_delay(a).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 32, 32]);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_connection_error() {
        let client = client(1).unwrap();
        let endpoint = JsonEndpoint {
            label: "Test",
            url: "http://127.0.0.1:1/nowhere".to_string(),
            bearer: None,
            max_retries: 0,
        };
        let err = post_json_with_retry(&client, &endpoint, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Test connection error"));
    }
}
