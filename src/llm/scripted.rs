//! Scripted model for tests and demos
//!
//! Replies are served in order; once the script runs out the model either
//! repeats its fallback reply or fails, depending on construction.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::errors::{CareError, Result};
use crate::llm::ChatModel;

/// Deterministic [`ChatModel`] that records every prompt it receives
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
    temperatures: Mutex<Vec<f32>>,
}

impl ScriptedModel {
    /// Serve `replies` in order, then fail
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
            temperatures: Mutex::new(Vec::new()),
        }
    }

    /// Answer every prompt with the same text
    pub fn always(reply: &str) -> Self {
        Self {
            fallback: Some(reply.to_string()),
            ..Self::default()
        }
    }

    /// Fail every prompt
    pub fn failing() -> Self {
        Self::default()
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Temperature requested with each prompt
    pub fn temperatures(&self) -> Vec<f32> {
        self.temperatures.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Number of prompts received so far
    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Ok(mut temperatures) = self.temperatures.lock() {
            temperatures.push(temperature);
        }

        let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| CareError::LlmApi("script exhausted".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
