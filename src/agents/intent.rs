//! Intent classification
//!
//! Order of decision:
//! 1. empty message → routine
//! 2. emergency keyword → emergency, urgency from [`calculate_urgency`]
//! 3. model classification at temperature 0
//! 4. model failure → keyword rules

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agents::contains_any;
use crate::cli::config::default_emergency_keywords;
use crate::errors::{CareError, Result};
use crate::graph::state::Intent;
use crate::llm::ChatModel;

const CLASSIFICATION_PROMPT: &str = r#"You are a medical AI intent classifier. Analyze the patient's message and classify it into one of these categories:

CATEGORIES:
1. "emergency" - Urgent medical situations requiring immediate attention (chest pain, difficulty breathing, severe symptoms)
2. "appointment" - Scheduling, rescheduling, or canceling appointments
3. "medical_records" - Requesting medical history, test results, medications, or updating personal information
4. "routine" - General questions, FAQs, office hours, insurance, prescriptions, general health advice

EMERGENCY KEYWORDS: {keywords}

Patient Message: {message}

Context: {context}

Classify this message and provide:
1. Primary intent (emergency/appointment/medical_records/routine)
2. Confidence level (1-10)
3. Brief reasoning
4. If emergency, specify urgency level (1-10)

Format your response as:
INTENT: [category]
CONFIDENCE: [1-10]
URGENCY: [1-10 if emergency, else 0]
REASONING: [brief explanation]
"#;

const HIGH_URGENCY: &[&str] = &["chest pain", "heart attack", "can't breathe", "unconscious", "suicide"];
const MEDIUM_URGENCY: &[&str] = &["severe pain", "bleeding", "allergic reaction", "difficulty breathing"];

/// Where a classification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    EmptyMessage,
    Keyword,
    Model,
    Fallback,
}

/// Classifier verdict
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: u8,
    pub urgency: u8,
    pub reasoning: String,
    pub source: ClassificationSource,
}

/// Urgency for a message that tripped the emergency fast-path
pub fn calculate_urgency(message_lower: &str) -> u8 {
    if contains_any(message_lower, HIGH_URGENCY) {
        10
    } else if contains_any(message_lower, MEDIUM_URGENCY) {
        8
    } else {
        6
    }
}

/// Fields parsed from a model reply; the intent label is kept raw
#[derive(Debug, Clone, PartialEq)]
struct ParsedReply {
    intent: String,
    confidence: u8,
    urgency: u8,
    reasoning: String,
}

/// Lenient parse of the `KEY: value` reply format. Unparseable numbers keep
/// their defaults; numbers are clamped to range.
fn parse_reply(reply: &str) -> ParsedReply {
    let mut parsed = ParsedReply {
        intent: "routine".to_string(),
        confidence: 5,
        urgency: 0,
        reasoning: "Default classification".to_string(),
    };

    for line in reply.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_ascii_uppercase().as_str() {
            "INTENT" => parsed.intent = value.to_lowercase(),
            "CONFIDENCE" => {
                if let Some(n) = leading_number(value) {
                    parsed.confidence = n.clamp(1, 10);
                }
            }
            "URGENCY" => {
                if let Some(n) = leading_number(value) {
                    parsed.urgency = n.min(10);
                }
            }
            "REASONING" => parsed.reasoning = value.to_string(),
            _ => {}
        }
    }

    parsed
}

/// Leading digits of `value` (`"8/10"` → 8), saturating at 255
fn leading_number(value: &str) -> Option<u8> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<u32>().map(|n| n.min(255) as u8).unwrap_or(u8::MAX))
}

/// Keyword rules used when the model is unavailable
pub fn fallback_classification(message: &str) -> Classification {
    let lower = message.to_lowercase();

    let (intent, urgency) = if contains_any(&lower, &["emergency", "urgent", "pain", "help"]) {
        (Intent::Emergency, 7)
    } else if contains_any(&lower, &["appointment", "schedule", "book", "cancel", "reschedule"]) {
        (Intent::Appointment, 0)
    } else if contains_any(&lower, &["records", "history", "medication", "prescription", "test results"]) {
        (Intent::MedicalRecords, 0)
    } else {
        (Intent::Routine, 0)
    };

    Classification {
        intent,
        confidence: 6,
        urgency,
        reasoning: "Fallback rule-based classification".to_string(),
        source: ClassificationSource::Fallback,
    }
}

/// Routes patient messages to an [`Intent`]
pub struct IntentClassifier {
    llm: Arc<dyn ChatModel>,
    keywords: Vec<String>,
    temperature: f32,
}

impl IntentClassifier {
    /// Classifier with the built-in emergency keyword list
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self::with_keywords(llm, default_emergency_keywords())
    }

    pub fn with_keywords(llm: Arc<dyn ChatModel>, keywords: Vec<String>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            llm,
            keywords,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Emergency keyword present in the message, if any
    pub fn emergency_keyword(&self, message_lower: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|k| message_lower.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Classify a message.
    ///
    /// Fails only when the model answers with a label that is not one of
    /// the four intents.
    pub async fn classify(&self, message: &str, context: &str) -> Result<Classification> {
        if message.trim().is_empty() {
            return Ok(Classification {
                intent: Intent::Routine,
                confidence: 10,
                urgency: 0,
                reasoning: "Empty message defaulted to routine".to_string(),
                source: ClassificationSource::EmptyMessage,
            });
        }

        let lower = message.to_lowercase();
        if let Some(keyword) = self.emergency_keyword(&lower) {
            let urgency = calculate_urgency(&lower);
            info!(keyword, urgency, "emergency keyword detected");
            return Ok(Classification {
                intent: Intent::Emergency,
                confidence: 9,
                urgency,
                reasoning: "Emergency keywords detected".to_string(),
                source: ClassificationSource::Keyword,
            });
        }

        let prompt = CLASSIFICATION_PROMPT
            .replace("{keywords}", &self.keywords.join(", "))
            .replace("{message}", message)
            .replace("{context}", context);

        let reply = match self.llm.complete(&prompt, self.temperature).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "classification model failed, using keyword rules");
                return Ok(fallback_classification(message));
            }
        };

        let parsed = parse_reply(&reply);
        debug!(label = %parsed.intent, "model classification");

        let intent = Intent::parse(&parsed.intent).ok_or_else(|| CareError::Handler {
            stage: "classify".to_string(),
            reason: format!("unrecognised intent '{}'", parsed.intent),
        })?;

        info!(intent = %intent, confidence = parsed.confidence, "classified intent");

        Ok(Classification {
            intent,
            confidence: parsed.confidence,
            urgency: parsed.urgency,
            reasoning: parsed.reasoning,
            source: ClassificationSource::Model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;

    fn classifier(model: ScriptedModel) -> (IntentClassifier, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        (IntentClassifier::new(model.clone()), model)
    }

    #[tokio::test]
    async fn test_empty_message_is_routine() {
        let (classifier, model) = classifier(ScriptedModel::failing());
        let result = classifier.classify("   ", "").await.unwrap();
        assert_eq!(result.intent, Intent::Routine);
        assert_eq!(result.confidence, 10);
        assert_eq!(result.source, ClassificationSource::EmptyMessage);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_keyword_fast_path_skips_model() {
        let (classifier, model) = classifier(ScriptedModel::failing());
        let result = classifier.classify("I have CHEST PAIN", "").await.unwrap();
        assert_eq!(result.intent, Intent::Emergency);
        assert_eq!(result.confidence, 9);
        assert_eq!(result.urgency, 10);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_classification() {
        let (classifier, model) = classifier(ScriptedModel::always(
            "INTENT: appointment\nCONFIDENCE: 8\nURGENCY: 0\nREASONING: wants to book",
        ));
        let result = classifier.classify("Can I see a doctor next week?", "returning patient").await.unwrap();
        assert_eq!(result.intent, Intent::Appointment);
        assert_eq!(result.confidence, 8);
        assert_eq!(result.reasoning, "wants to book");
        assert_eq!(result.source, ClassificationSource::Model);

        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Patient Message: Can I see a doctor next week?"));
        assert!(prompt.contains("Context: returning patient"));
    }

    #[tokio::test]
    async fn test_unknown_label_is_error() {
        let (classifier, _) = classifier(ScriptedModel::always("INTENT: billing\nCONFIDENCE: 7"));
        let err = classifier.classify("How much is a visit?", "").await.unwrap_err();
        assert!(err.to_string().contains("unrecognised intent 'billing'"));
    }

    #[tokio::test]
    async fn test_model_failure_uses_rules() {
        let (classifier, _) = classifier(ScriptedModel::failing());

        let result = classifier.classify("I need to reschedule", "").await.unwrap();
        assert_eq!(result.intent, Intent::Appointment);
        assert_eq!(result.source, ClassificationSource::Fallback);

        let result = classifier.classify("it is urgent", "").await.unwrap();
        assert_eq!(result.intent, Intent::Emergency);
        assert_eq!(result.urgency, 7);
    }

    #[tokio::test]
    async fn test_custom_keywords() {
        let model = Arc::new(ScriptedModel::failing());
        let classifier = IntentClassifier::with_keywords(model, vec!["  SEIZURE ".to_string(), String::new()]);
        let result = classifier.classify("my son had a seizure", "").await.unwrap();
        assert_eq!(result.intent, Intent::Emergency);
        assert_eq!(result.urgency, 6);
        assert!(classifier.emergency_keyword("chest pain").is_none());
    }

    #[test]
    fn test_calculate_urgency() {
        assert_eq!(calculate_urgency("i think it's a heart attack"), 10);
        assert_eq!(calculate_urgency("the bleeding won't stop"), 8);
        assert_eq!(calculate_urgency("this is an emergency"), 6);
    }

    #[test]
    fn test_parse_reply_defaults() {
        let parsed = parse_reply("nothing useful here");
        assert_eq!(parsed.intent, "routine");
        assert_eq!(parsed.confidence, 5);
        assert_eq!(parsed.urgency, 0);
        assert_eq!(parsed.reasoning, "Default classification");
    }

    #[test]
    fn test_parse_reply_lenient() {
        let parsed = parse_reply(
            "  intent: MEDICAL_RECORDS\nConfidence: 9/10\nURGENCY: 42\nREASONING: asks: for labs\n",
        );
        assert_eq!(parsed.intent, "medical_records");
        assert_eq!(parsed.confidence, 9);
        assert_eq!(parsed.urgency, 10);
        assert_eq!(parsed.reasoning, "asks: for labs");
    }

    #[test]
    fn test_parse_reply_bad_numbers_keep_defaults() {
        let parsed = parse_reply("INTENT: routine\nCONFIDENCE: high\nURGENCY: none");
        assert_eq!(parsed.confidence, 5);
        assert_eq!(parsed.urgency, 0);

        let parsed = parse_reply("CONFIDENCE: 0");
        assert_eq!(parsed.confidence, 1);
    }

    #[test]
    fn test_fallback_order() {
        assert_eq!(fallback_classification("help me book").intent, Intent::Emergency);
        assert_eq!(fallback_classification("cancel my visit").intent, Intent::Appointment);
        assert_eq!(fallback_classification("show my test results").intent, Intent::MedicalRecords);
        assert_eq!(fallback_classification("where do I park").intent, Intent::Routine);
    }
}
