//! OpenAI-compatible chat-completion client.

use std::time::Duration;

use robot_mcp_core::AiConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on the length of a generated summary.
pub const SUMMARY_MAX_TOKENS: u32 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion returned empty content")]
    EmptyContent,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatTurn<'a>; 2],
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Calls `POST {base_url}/chat/completions` with a system and a user turn.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
}

impl CompletionClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Non-streaming completion; returns the first choice's text.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, non-2xx replies, and empty content.
    pub async fn complete(
        &self,
        config: &AiConfig,
        system_prompt: &str,
        user_content: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &config.model,
            messages: [
                ChatTurn {
                    role: "system",
                    content: system_prompt,
                },
                ChatTurn {
                    role: "user",
                    content: user_content,
                },
            ],
            max_tokens: SUMMARY_MAX_TOKENS,
            stream: false,
        };

        let url = format!("{}/chat/completions", config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, model = %config.model, "completion response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CompletionError::EmptyContent)
    }
}
