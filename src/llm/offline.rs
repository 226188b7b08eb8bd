//! Offline model used when no API key is configured

use async_trait::async_trait;

use crate::errors::{CareError, Result};
use crate::llm::ChatModel;

/// Model that refuses every request, so each stage answers from its
/// rule-based or static fallback
#[derive(Debug, Clone, Default)]
pub struct OfflineModel;

#[async_trait]
impl ChatModel for OfflineModel {
    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        Err(CareError::LlmUnavailable(
            "no GROQ_API_KEY configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_always_fails() {
        let model = OfflineModel;
        let err = model.complete("hello", 0.0).await.unwrap_err();
        assert!(matches!(err, CareError::LlmUnavailable(_)));
        assert_eq!(model.name(), "offline");
    }
}
