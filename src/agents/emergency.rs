//! Emergency handler
//!
//! Identifies the kind of emergency, looks up the first-aid protocol, asks
//! the model for guidance and raises an alert when urgency crosses the
//! configured threshold.

use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::agents::{contains_any, EMERGENCY_CONTACTS};
use crate::alerts::{AlertManager, AlertReceipt};
use crate::errors::{CareError, Result};
use crate::graph::state::{ConversationState, HandlerOutcome};
use crate::llm::ChatModel;
use crate::records::{Patient, RecordStore};

const EMERGENCY_PROMPT: &str = r#"You are an emergency medical AI assistant. A patient is reporting urgent symptoms.

PATIENT INFORMATION:
{patient_info}

REPORTED SYMPTOMS:
{symptoms}

URGENCY LEVEL: {urgency}/10

YOUR RESPONSE SHOULD:
1. Acknowledge the seriousness
2. Provide immediate safety advice
3. Recommend next steps (call 911, go to ER, etc.)
4. If urgency >= 8, strongly recommend emergency services
5. Be calm but urgent in tone

IMPORTANT:
- You are NOT replacing medical professionals
- Always recommend seeking immediate professional help for serious symptoms
- Provide basic first aid advice when appropriate
- Be clear about limitations

Respond with empathy and urgency appropriate to the situation.
"#;

/// Urgency assumed when the classifier gave none
const DEFAULT_URGENCY: u8 = 5;

/// Kind of emergency described by the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyType {
    ChestPain,
    BreathingDifficulty,
    SevereBleeding,
    Unconscious,
    AllergicReaction,
    General,
    /// The handler itself failed and the static protocol was used
    SystemFallback,
}

impl EmergencyType {
    /// First match wins, in declaration order
    pub fn identify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if contains_any(&lower, &["chest pain", "heart attack", "heart"]) {
            EmergencyType::ChestPain
        } else if contains_any(&lower, &["can't breathe", "shortness of breath", "breathing", "breathe"]) {
            EmergencyType::BreathingDifficulty
        } else if contains_any(&lower, &["bleeding", "blood", "cut", "wound"]) {
            EmergencyType::SevereBleeding
        } else if contains_any(&lower, &["unconscious", "fainted", "passed out"]) {
            EmergencyType::Unconscious
        } else if contains_any(&lower, &["allergic", "allergy", "swelling", "hives"]) {
            EmergencyType::AllergicReaction
        } else {
            EmergencyType::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyType::ChestPain => "chest_pain",
            EmergencyType::BreathingDifficulty => "breathing_difficulty",
            EmergencyType::SevereBleeding => "severe_bleeding",
            EmergencyType::Unconscious => "unconscious",
            EmergencyType::AllergicReaction => "allergic_reaction",
            EmergencyType::General => "general_emergency",
            EmergencyType::SystemFallback => "system_fallback",
        }
    }

    /// First-aid protocol, when one exists for this type
    pub fn protocol(&self) -> Option<Protocol> {
        let (advice, urgency) = match self {
            EmergencyType::ChestPain => (
                "Sit down, stay calm, chew aspirin if not allergic, call 911 immediately",
                10,
            ),
            EmergencyType::BreathingDifficulty => (
                "Sit upright, try to stay calm, use rescue inhaler if available, call 911",
                9,
            ),
            EmergencyType::SevereBleeding => (
                "Apply direct pressure to wound, elevate if possible, call 911",
                9,
            ),
            EmergencyType::Unconscious => (
                "Check breathing, place in recovery position if breathing, call 911 immediately",
                10,
            ),
            EmergencyType::AllergicReaction => ("Use EpiPen if available, call 911, avoid allergen", 8),
            EmergencyType::General | EmergencyType::SystemFallback => return None,
        };

        Some(Protocol {
            advice,
            urgency,
            call_911: true,
        })
    }
}

/// First-aid protocol for an emergency type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    pub advice: &'static str,
    pub urgency: u8,
    pub call_911: bool,
}

/// Patient details relevant to first responders
pub fn patient_summary(patient: Option<&Patient>) -> String {
    let Some(patient) = patient else {
        return "Patient information not available".to_string();
    };

    let mut parts = vec![
        format!("Name: {}", patient.name),
        format!(
            "Age: {}",
            patient.age.map(|a| a.to_string()).unwrap_or_else(|| "Unknown".to_string())
        ),
        format!("Gender: {}", patient.gender.as_deref().unwrap_or("Unknown")),
    ];

    if !patient.allergies.is_empty() {
        parts.push(format!("Allergies: {}", patient.allergies.join(", ")));
    }

    if !patient.medications.is_empty() {
        let names: Vec<&str> = patient.medications.iter().take(3).map(|m| m.name.as_str()).collect();
        parts.push(format!("Current Medications: {}", names.join(", ")));
    }

    if let Some(contact) = &patient.emergency_contact {
        parts.push(format!("Emergency Contact: {} ({})", contact.name, contact.phone));
    }

    parts.join("\n")
}

/// Guidance used when the model cannot be reached
pub fn default_guidance(urgency: u8) -> &'static str {
    if urgency >= 8 {
        "This appears to be a serious medical emergency. Please take the following immediate actions:

1. **Call 911 immediately** or go to the nearest emergency room
2. Stay calm and follow dispatcher instructions
3. If possible, have someone stay with you
4. Do not drive yourself if experiencing severe symptoms

This is not a substitute for professional medical care."
    } else {
        "This may require urgent medical attention. Please consider:

1. Calling your doctor immediately
2. Going to urgent care or emergency room
3. Calling 911 if symptoms worsen
4. Having someone available to assist you

Please seek professional medical evaluation as soon as possible."
    }
}

/// Assemble the reply shown to the patient
pub fn build_response(
    guidance: &str,
    protocol: Option<Protocol>,
    urgency: u8,
    alert: Option<&AlertReceipt>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(
        if urgency >= 9 {
            "🚨 **IMMEDIATE EMERGENCY** 🚨"
        } else if urgency >= 7 {
            "⚠️ **URGENT MEDICAL SITUATION** ⚠️"
        } else {
            "🏥 **Medical Attention Needed** 🏥"
        }
        .to_string(),
    );

    parts.push(guidance.to_string());

    if let Some(protocol) = protocol {
        parts.push(format!("\n**Immediate Actions:**\n{}", protocol.advice));
    }

    if urgency >= 8 || protocol.map(|p| p.call_911).unwrap_or(false) {
        parts.push("\n🚨 **CALL 911 IMMEDIATELY** 🚨".to_string());
    }

    match alert {
        Some(receipt) if receipt.sent => parts.push(format!(
            "\n✅ Our care team has been alerted (Alert ID: {})",
            receipt.alert_id
        )),
        _ => parts.push("\n📞 Please contact emergency services directly at 911".to_string()),
    }

    parts.push(format!("\n{}", EMERGENCY_CONTACTS));

    parts.join("\n")
}

/// Static reply used when the emergency handler cannot run at all
pub fn fallback_response() -> String {
    format!(
        "🚨 EMERGENCY PROTOCOL ACTIVATED 🚨

I understand this is an urgent situation. Due to a system issue, I cannot provide detailed guidance right now.

**IMMEDIATE ACTIONS:**
• Call 911 immediately: **911**
• Go to the nearest emergency room
• Contact your doctor if possible

**This is an emergency situation requiring immediate professional medical attention.**

Alert ID: FALLBACK_{}",
        Local::now().timestamp()
    )
}

/// Emergency handler
pub struct EmergencyAgent {
    llm: Arc<dyn ChatModel>,
    alerts: Arc<AlertManager>,
    urgency_threshold: u8,
    auto_alert: bool,
    temperature: f32,
}

impl EmergencyAgent {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        alerts: Arc<AlertManager>,
        urgency_threshold: u8,
        auto_alert: bool,
    ) -> Self {
        Self {
            llm,
            alerts,
            urgency_threshold,
            auto_alert,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    async fn guidance(&self, symptoms: &str, patient_info: &str, urgency: u8) -> String {
        let prompt = EMERGENCY_PROMPT
            .replace("{patient_info}", patient_info)
            .replace("{symptoms}", symptoms)
            .replace("{urgency}", &urgency.to_string());

        match self.llm.complete(&prompt, self.temperature).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "emergency guidance unavailable, using default");
                default_guidance(urgency).to_string()
            }
        }
    }

    /// Produce the emergency reply and raise an alert if warranted. Fails
    /// when an identified patient cannot be looked up because the clinic
    /// records are unavailable.
    pub async fn handle(&self, state: &mut ConversationState, records: &RecordStore) -> Result<()> {
        if !state.is_anonymous() && records.is_empty() {
            return Err(CareError::Records("clinic records unavailable".to_string()));
        }

        let urgency = if state.urgency == 0 { DEFAULT_URGENCY } else { state.urgency.min(10) };
        state.urgency = urgency;

        error!(patient_id = %state.patient_id, urgency, "emergency triggered");

        let summary = if state.is_anonymous() {
            patient_summary(None)
        } else {
            patient_summary(records.patient(&state.patient_id))
        };

        let emergency_type = EmergencyType::identify(&state.message);
        let protocol = emergency_type.protocol();
        let guidance = self.guidance(&state.message, &summary, urgency).await;

        let receipt = if self.auto_alert && urgency >= self.urgency_threshold {
            let receipt = self.alerts.send_emergency_alert(
                &format!("Patient ID: {}\n{}", state.patient_id, summary),
                &state.message,
                urgency,
            );
            error!(alert_id = %receipt.alert_id, delivered = receipt.delivered, "emergency alert raised");
            Some(receipt)
        } else {
            None
        };

        state.response = build_response(&guidance, protocol, urgency, receipt.as_ref());
        state.outcome = HandlerOutcome::Emergency {
            emergency_type,
            alert_id: receipt.as_ref().map(|r| r.alert_id.clone()),
            alert_sent: receipt.map(|r| r.sent).unwrap_or(false),
        };

        info!(emergency_type = emergency_type.as_str(), urgency, "emergency response generated");
        Ok(())
    }

    /// Replace the reply with the static protocol
    pub fn apply_fallback(state: &mut ConversationState) {
        state.urgency = 10;
        state.response = fallback_response();
        state.outcome = HandlerOutcome::Emergency {
            emergency_type: EmergencyType::SystemFallback,
            alert_id: None,
            alert_sent: false,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{Alert, AlertSink};
    use crate::llm::ScriptedModel;
    use crate::records::{sample_data, ClinicData};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSink {
        count: Mutex<usize>,
    }

    impl AlertSink for CountingSink {
        fn deliver(&self, _alert: &Alert) -> Result<()> {
            *self.count.lock().unwrap() += 1;
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn agent(model: ScriptedModel, auto_alert: bool) -> EmergencyAgent {
        EmergencyAgent::new(
            Arc::new(model),
            Arc::new(AlertManager::with_sink(Box::new(CountingSink::default()), None)),
            7,
            auto_alert,
        )
    }

    fn state(message: &str, patient: &str, urgency: u8) -> ConversationState {
        let mut state = ConversationState::new(message, Some(patient), "");
        state.urgency = urgency;
        state
    }

    #[test]
    fn test_identify_order() {
        assert_eq!(EmergencyType::identify("Chest pain!"), EmergencyType::ChestPain);
        assert_eq!(EmergencyType::identify("my heart is racing"), EmergencyType::ChestPain);
        assert_eq!(EmergencyType::identify("I can't breathe"), EmergencyType::BreathingDifficulty);
        assert_eq!(EmergencyType::identify("deep cut on my arm"), EmergencyType::SevereBleeding);
        assert_eq!(EmergencyType::identify("she fainted"), EmergencyType::Unconscious);
        assert_eq!(EmergencyType::identify("hives everywhere"), EmergencyType::AllergicReaction);
        assert_eq!(EmergencyType::identify("something is very wrong"), EmergencyType::General);
    }

    #[test]
    fn test_protocols() {
        let chest = EmergencyType::ChestPain.protocol().unwrap();
        assert_eq!(chest.urgency, 10);
        assert!(chest.call_911);
        assert_eq!(EmergencyType::AllergicReaction.protocol().unwrap().urgency, 8);
        assert!(EmergencyType::General.protocol().is_none());
        assert_eq!(EmergencyType::General.as_str(), "general_emergency");
    }

    #[test]
    fn test_patient_summary() {
        let data = sample_data();
        let summary = patient_summary(data.patients.first());
        assert!(summary.contains("Name: John Smith"));
        assert!(summary.contains("Allergies: Penicillin, Shellfish"));
        assert!(summary.contains("Current Medications: Lisinopril, Metformin, Atorvastatin"));
        assert!(summary.contains("Emergency Contact: Mary Smith (555-0102)"));
        assert_eq!(patient_summary(None), "Patient information not available");
    }

    #[test]
    fn test_build_response_banners() {
        let high = build_response("g", None, 9, None);
        assert!(high.starts_with("🚨 **IMMEDIATE EMERGENCY** 🚨"));
        assert!(high.contains("CALL 911 IMMEDIATELY"));
        assert!(high.contains("contact emergency services directly"));
        assert!(high.contains("Poison Control: 1-800-222-1222"));

        let medium = build_response("g", None, 7, None);
        assert!(medium.starts_with("⚠️ **URGENT MEDICAL SITUATION** ⚠️"));
        assert!(!medium.contains("CALL 911 IMMEDIATELY"));

        let low = build_response("g", EmergencyType::AllergicReaction.protocol(), 5, None);
        assert!(low.starts_with("🏥 **Medical Attention Needed** 🏥"));
        assert!(low.contains("Use EpiPen"));
        assert!(low.contains("CALL 911 IMMEDIATELY"));
    }

    #[tokio::test]
    async fn test_handle_raises_alert_above_threshold() {
        let agent = agent(ScriptedModel::always("Stay calm, help is coming."), true);
        let records = RecordStore::in_memory(sample_data());
        let mut state = state("crushing chest pain", "patient-001", 10);

        agent.handle(&mut state, &records).await.unwrap();

        assert!(state.response.contains("Stay calm, help is coming."));
        assert!(state.response.contains("Alert ID: EMRG_"));
        match &state.outcome {
            HandlerOutcome::Emergency { emergency_type, alert_id, alert_sent } => {
                assert_eq!(*emergency_type, EmergencyType::ChestPain);
                assert!(alert_id.is_some());
                assert!(*alert_sent);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handle_below_threshold_no_alert() {
        let agent = agent(ScriptedModel::failing(), true);
        let records = RecordStore::in_memory(sample_data());
        let mut state = state("this is an emergency", "patient-002", 6);

        agent.handle(&mut state, &records).await.unwrap();

        assert!(state.response.contains("This may require urgent medical attention"));
        assert!(matches!(
            state.outcome,
            HandlerOutcome::Emergency { alert_sent: false, alert_id: None, .. }
        ));
    }

    #[tokio::test]
    async fn test_auto_alert_disabled() {
        let agent = agent(ScriptedModel::failing(), false);
        let records = RecordStore::in_memory(sample_data());
        let mut state = state("unconscious on the floor", "patient-003", 10);

        agent.handle(&mut state, &records).await.unwrap();
        assert!(state.response.contains("serious medical emergency"));
        assert!(matches!(state.outcome, HandlerOutcome::Emergency { alert_sent: false, .. }));
    }

    #[tokio::test]
    async fn test_prompt_includes_patient_summary() {
        let model = Arc::new(ScriptedModel::always("ok"));
        let agent = EmergencyAgent::new(
            model.clone(),
            Arc::new(AlertManager::with_sink(Box::new(CountingSink::default()), None)),
            7,
            false,
        );
        let records = RecordStore::in_memory(sample_data());
        let mut state = state("bleeding badly", "patient-001", 8);

        agent.handle(&mut state, &records).await.unwrap();
        let prompt = &model.prompts()[0];
        assert!(prompt.contains("Name: John Smith"));
        assert!(prompt.contains("URGENCY LEVEL: 8/10"));
    }

    #[tokio::test]
    async fn test_missing_urgency_defaults() {
        let agent = agent(ScriptedModel::failing(), true);
        let records = RecordStore::in_memory(sample_data());
        let mut state = state("please help", "patient-001", 0);
        agent.handle(&mut state, &records).await.unwrap();
        assert_eq!(state.urgency, DEFAULT_URGENCY);
    }

    #[tokio::test]
    async fn test_unavailable_records_fail_for_known_patient() {
        let agent = agent(ScriptedModel::always("Stay calm."), true);
        let empty = RecordStore::in_memory(ClinicData::default());

        let mut known = state("chest pain", "patient-001", 10);
        assert!(agent.handle(&mut known, &empty).await.is_err());
        assert!(agent.alerts.recent_alerts(5).is_empty());

        let mut anonymous = ConversationState::new("chest pain", None, "");
        agent.handle(&mut anonymous, &empty).await.unwrap();
        assert!(anonymous.response.contains("Stay calm."));
    }

    #[test]
    fn test_fallback() {
        let mut state = ConversationState::new("help", None, "");
        EmergencyAgent::apply_fallback(&mut state);
        assert_eq!(state.urgency, 10);
        assert!(state.response.contains("EMERGENCY PROTOCOL ACTIVATED"));
        assert!(state.response.contains("Alert ID: FALLBACK_"));
    }
}
