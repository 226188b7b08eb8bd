//! Groq chat completion client
//!
//! Speaks the OpenAI-compatible `POST {base}/chat/completions` API with a
//! bearer token. One request per call, no streaming, no history.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, trace};

use crate::cli::config::LlmConfig;
use crate::errors::{CareError, Result};
use crate::llm::ChatModel;

/// Default Groq API base
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Groq (OpenAI-compatible) chat client
#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

impl GroqClient {
    /// Create client with default endpoint and model
    pub fn new(api_key: &str) -> Result<Self> {
        Self::from_config(&LlmConfig::default(), api_key)
    }

    /// Create client from the `[llm]` configuration section
    pub fn from_config(config: &LlmConfig, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(CareError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
            max_tokens: config.max_tokens,
        })
    }

    /// Check if the API answers the models listing with this key
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, temperature, prompt_len = prompt.len(), "sending LLM request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "LLM request failed (transport)");
                CareError::LlmApi(format!("Failed to send request: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CareError::LlmApi(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CareError::LlmApi(format!("Failed to parse response: {}", e)))?;

        let text = extract_content(parsed)?;
        trace!(reply = %text, "LLM reply");
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn extract_content(parsed: ChatCompletionResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CareError::LlmApi("empty or missing content in response".to_string()))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
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
