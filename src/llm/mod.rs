//! Language model access
//!
//! Every stage talks to the model through [`ChatModel`], a single prompt in,
//! single completion out. The hosted client is OpenAI-compatible (Groq);
//! [`OfflineModel`] stands in when no API key is configured so that every
//! stage takes its fallback path.

pub mod client;
pub mod offline;
pub mod scripted;

use async_trait::async_trait;

use crate::errors::Result;

pub use client::{GroqClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use offline::OfflineModel;
pub use scripted::ScriptedModel;

/// One-shot chat completion
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send `prompt` as a single user message and return the reply text
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Model identifier for logs and banners
    fn name(&self) -> &str;
}
