//! Error types for careline
//!
//! Stage errors are recorded on the conversation state and replaced by a
//! fallback reply; these types only surface at the library boundary.

use thiserror::Error;

/// Main error type for the careline assistant
#[derive(Error, Debug)]
pub enum CareError {
    /// Workflow stage machine transition errors
    #[error("Invalid stage transition from {from} via {event}")]
    InvalidTransition { from: String, event: String },

    /// Language model API errors (non-2xx, malformed body, empty content)
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// No language model is configured (offline / demo mode)
    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Clinic record store errors
    #[error("Record store error: {0}")]
    Records(String),

    /// Conversation session file errors
    #[error("Session storage error: {0}")]
    Session(String),

    /// Alert dispatch errors
    #[error("Alert error: {0}")]
    Alert(String),

    /// A specialized handler could not produce a reply
    #[error("{stage} handler failed: {reason}")]
    Handler { stage: String, reason: String },
}

/// Result type alias for careline operations
pub type Result<T> = std::result::Result<T, CareError>;

/// Convert anyhow errors to CareError
impl From<anyhow::Error> for CareError {
    fn from(err: anyhow::Error) -> Self {
        CareError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CareError::LlmApi("HTTP 429: rate limited".to_string());
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().starts_with("LLM API error"));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = CareError::InvalidTransition {
            from: "Persist".to_string(),
            event: "Classified(Routine)".to_string(),
        };
        assert!(err.to_string().contains("Persist"));
        assert!(err.to_string().contains("Classified"));
    }

    #[test]
    fn test_handler_error() {
        let err = CareError::Handler {
            stage: "scheduling".to_string(),
            reason: "no doctors".to_string(),
        };
        assert_eq!(err.to_string(), "scheduling handler failed: no doctors");
    }

    #[test]
    fn test_io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: CareError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
