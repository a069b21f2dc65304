use crate::collaborators::ConversationalAgent;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant named Jarvis.";
const MAX_TOKENS: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completion endpoint.
///
/// Each prompt is sent on its own with the system prompt; no conversation
/// history is kept between calls.
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: SecretString, model: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": MAX_TOKENS
        })
    }
}

#[async_trait]
impl ConversationalAgent for ChatClient {
    async fn ask(&self, prompt: &str) -> Result<String> {
        tracing::debug!("Asking {} for a reply", self.model);
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(prompt))
            .send()
            .await
            .context("Chat request failed")?
            .error_for_status()
            .context("Chat backend returned an error status")?
            .json::<LlmResponse>()
            .await
            .context("Failed to decode chat response")?;

        extract_reply(resp)
    }
}

fn extract_reply(resp: LlmResponse) -> Result<String> {
    let content = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?
        .message
        .content
        .unwrap_or_default();
    Ok(content.trim().to_string())
}
