//! OpenAI chat-completions client used for answer generation.
//!
//! Same retry policy as the embeddings client: 429/5xx/network errors back
//! off exponentially, other 4xx fail immediately.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LlmConfig;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Answer-generation backend seam. The production implementation is
/// [`ChatClient`]; tests substitute scripted fakes.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one completion over a single user prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Client for the chat-completions endpoint. Construction fails without
/// `OPENAI_API_KEY` in the environment.
pub struct ChatClient {
    api_key: String,
    config: LlmConfig,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            config: config.clone(),
            http,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Generator for ChatClient {
    /// Send a single-user-message completion request and return the first
    /// choice's trimmed content.
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "user", "content": prompt},
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(CHAT_COMPLETIONS_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Chat API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Chat API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))?;

    Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_trims_content() {
        let json = serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "  An answer.\n"}}
            ]
        });
        assert_eq!(parse_completion_response(&json).unwrap(), "An answer.");
    }

    #[test]
    fn parse_response_without_choices_errors() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_completion_response(&json).is_err());
    }
}
