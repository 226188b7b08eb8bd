//! Medical records handler
//!
//! Read-only rendering of the patient's chart. Every access writes an audit
//! line at `info` with the patient id and request type.

use tracing::info;

use crate::agents::{contains_any, OFFICE_PHONE, PATIENT_PORTAL};
use crate::errors::{CareError, Result};
use crate::graph::state::{ConversationState, HandlerOutcome};
use crate::records::{Patient, RecordStore};

/// Section of the chart the patient asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordsRequest {
    MedicalHistory,
    Medications,
    Allergies,
    TestResults,
    Summary,
    Update,
    General,
    PatientNotFound,
}

impl RecordsRequest {
    /// First match wins, in declaration order
    pub fn analyze(message: &str) -> Self {
        let lower = message.to_lowercase();

        if contains_any(&lower, &["history", "medical history", "past", "conditions", "diagnoses"]) {
            RecordsRequest::MedicalHistory
        } else if contains_any(&lower, &["medication", "medicine", "prescription", "pills", "drugs"]) {
            RecordsRequest::Medications
        } else if contains_any(&lower, &["allergy", "allergies", "allergic", "reactions"]) {
            RecordsRequest::Allergies
        } else if contains_any(&lower, &["test", "lab", "results", "blood work", "x-ray", "scan"]) {
            RecordsRequest::TestResults
        } else if contains_any(&lower, &["summary", "overview", "complete", "all records"]) {
            RecordsRequest::Summary
        } else if contains_any(&lower, &["update", "change", "modify", "correct"]) {
            RecordsRequest::Update
        } else {
            RecordsRequest::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordsRequest::MedicalHistory => "medical_history",
            RecordsRequest::Medications => "medications",
            RecordsRequest::Allergies => "allergies",
            RecordsRequest::TestResults => "test_results",
            RecordsRequest::Summary => "summary",
            RecordsRequest::Update => "update",
            RecordsRequest::General => "general",
            RecordsRequest::PatientNotFound => "patient_not_found",
        }
    }
}

fn or_unknown<'a>(value: &'a str, unknown: &'a str) -> &'a str {
    if value.is_empty() {
        unknown
    } else {
        value
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

fn medical_history(records: &RecordStore, patient_id: &str) -> String {
    let history = records.medical_history(patient_id);
    if history.is_empty() {
        return "Your medical records show no significant medical history on file. If you believe this is incorrect, please contact our office to update your records."
            .to_string();
    }

    let mut text = String::from("📋 **Your Medical History:**\n\n");
    for condition in history {
        text.push_str(&format!(
            "• **{}**\n  📅 Diagnosed: {}\n  📊 Status: {}\n\n",
            or_unknown(&condition.condition, "Unknown condition"),
            or_unknown(&condition.diagnosed, "Date not specified"),
            title_case(or_unknown(&condition.status, "Unknown"))
        ));
    }
    text.push_str("⚠️ **Important:** This information is for your reference. Please discuss any questions about your medical history with your healthcare provider.\n\n");
    text.push_str("🔄 **Need updates?** Contact our office if any information needs correction or if you have new conditions to report.");
    text
}

fn medications(records: &RecordStore, patient_id: &str) -> String {
    let medications = records.medications(patient_id);
    if medications.is_empty() {
        return "Your records show no current medications on file. If you are taking medications, please contact our office to update your records."
            .to_string();
    }

    let mut text = String::from("💊 **Your Current Medications:**\n\n");
    for med in medications {
        text.push_str(&format!(
            "• **{}**\n  💊 Dosage: {}\n  🕐 Frequency: {}\n\n",
            or_unknown(&med.name, "Unknown medication"),
            or_unknown(&med.dosage, "Not specified"),
            or_unknown(&med.frequency, "Not specified")
        ));
    }
    text.push_str("⚠️ **Medication Safety:**\n");
    text.push_str("• Always take medications as prescribed\n");
    text.push_str("• Inform all healthcare providers about your medications\n");
    text.push_str("• Don't stop medications without consulting your doctor\n");
    text.push_str("• Report any side effects immediately\n\n");
    text.push_str("🔄 **Refills needed?** Contact our office or use the patient portal.");
    text
}

fn allergies(records: &RecordStore, patient_id: &str) -> String {
    let allergies = records.allergies(patient_id);
    if allergies.is_empty() {
        return "Your records show no known allergies on file. If you have allergies, please contact our office immediately to update your records for your safety."
            .to_string();
    }

    let mut text = String::from("🚨 **Your Known Allergies:**\n\n");
    for allergy in allergies {
        text.push_str(&format!("• **{}**\n", allergy));
    }
    text.push_str("\n⚠️ **Critical Safety Information:**\n");
    text.push_str("• Always inform healthcare providers about your allergies\n");
    text.push_str("• Carry allergy information with you\n");
    text.push_str("• Consider wearing a medical alert bracelet\n");
    text.push_str("• Know the signs of allergic reactions\n");
    text.push_str("• Have emergency medications available if prescribed\n\n");
    text.push_str("🆘 **Emergency:** If experiencing severe allergic reaction, call 911 immediately.");
    text
}

fn test_results() -> String {
    format!(
        "🧪 **Laboratory & Test Results:**\n\n\
         For security and privacy reasons, detailed test results are available through:\n\n\
         🌐 **Patient Portal:** {portal}\n\
         📞 **Call Office:** {phone}\n\n\
         💡 **Note:** Detailed results and interpretations should be discussed with your healthcare provider.",
        portal = PATIENT_PORTAL,
        phone = OFFICE_PHONE
    )
}

fn summary(records: &RecordStore, patient: &Patient) -> String {
    let mut text = format!("📊 **Medical Records Summary for {}**\n\n", patient.name);

    text.push_str("👤 **Patient Information:**\n");
    text.push_str(&format!("• Name: {}\n", patient.name));
    text.push_str(&format!(
        "• Age: {}\n",
        patient.age.map(|a| a.to_string()).unwrap_or_else(|| "Not specified".to_string())
    ));
    text.push_str(&format!(
        "• Gender: {}\n\n",
        patient.gender.as_deref().unwrap_or("Not specified")
    ));

    text.push_str("📋 **Medical History:**\n");
    let history = records.medical_history(&patient.id);
    if history.is_empty() {
        text.push_str("• No significant medical history on file\n");
    }
    for condition in history {
        text.push_str(&format!(
            "• {} ({})\n",
            condition.condition,
            or_unknown(&condition.diagnosed, "Date unknown")
        ));
    }

    text.push_str("\n💊 **Current Medications:**\n");
    let medications = records.medications(&patient.id);
    if medications.is_empty() {
        text.push_str("• No current medications on file\n");
    }
    for med in medications {
        text.push_str(&format!("• {} - {} {}\n", med.name, med.dosage, med.frequency));
    }

    text.push_str("\n🚨 **Known Allergies:**\n");
    let allergies = records.allergies(&patient.id);
    if allergies.is_empty() {
        text.push_str("• No known allergies on file\n");
    }
    for allergy in allergies {
        text.push_str(&format!("• {}\n", allergy));
    }

    text.push_str("\n⚠️ **Important:** This is a summary for your reference. Always consult your healthcare provider for medical decisions and detailed explanations.");
    text
}

fn update() -> String {
    format!(
        "🔄 **Updating Medical Records**\n\n\
         For security and accuracy, medical record updates require verification. Here's how to update your information:\n\n\
         **📞 Call Our Office:**\n\
         • Phone: {phone}\n\
         • Speak with medical records staff\n\
         • Verification required\n\n\
         **🌐 Patient Portal:**\n\
         • Log in to {portal}\n\
         • Use secure messaging\n\
         • Upload documents if needed\n\n\
         **🏥 In-Person Visit:**\n\
         • Visit our office with ID\n\
         • Complete update forms\n\n\
         **Common Updates:**\n\
         • New allergies or medications\n\
         • Contact information changes\n\
         • Insurance updates\n\
         • Emergency contact changes\n\n\
         ⚠️ **Important:** Keeping your medical records current helps ensure safe, effective care.",
        phone = OFFICE_PHONE,
        portal = PATIENT_PORTAL
    )
}

fn general() -> String {
    format!(
        "📋 **Medical Records Information**\n\n\
         I can help you access various types of medical information:\n\n\
         **Available Information:**\n\
         • 📋 Medical history and diagnoses\n\
         • 💊 Current medications and prescriptions\n\
         • 🚨 Known allergies and reactions\n\
         • 🧪 Lab and test results (via portal)\n\
         • 📊 Complete medical records summary\n\n\
         **How to Access:**\n\
         • Ask me specific questions about your records\n\
         • Use our patient portal: {portal}\n\
         • Call our office: {phone}\n\n\
         **Example Requests:**\n\
         • \"Show me my medical history\"\n\
         • \"What medications am I taking?\"\n\
         • \"Do I have any allergies on file?\"\n\
         • \"I need a summary of my records\"\n\n\
         🔒 **Privacy:** All medical records access is secure and logged for your protection.",
        portal = PATIENT_PORTAL,
        phone = OFFICE_PHONE
    )
}

/// Static reply used when the records handler cannot run at all
pub fn fallback_response() -> String {
    "I'm having trouble accessing medical records. Please call our office or use the patient portal."
        .to_string()
}

/// Medical records handler
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordsAgent;

impl RecordsAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, state: &mut ConversationState, records: &RecordStore) -> Result<()> {
        if records.is_empty() {
            return Err(CareError::Records("clinic records unavailable".to_string()));
        }

        let Some(patient) = records.patient(&state.patient_id) else {
            info!(patient_id = %state.patient_id, request = "patient_not_found", "records access");
            state.response = format!(
                "I'm sorry, but I couldn't find your medical records. Please verify your patient ID or contact our office at {}.",
                OFFICE_PHONE
            );
            state.outcome = HandlerOutcome::Records {
                request: RecordsRequest::PatientNotFound,
            };
            return Ok(());
        };

        let request = RecordsRequest::analyze(&state.message);
        info!(patient_id = %patient.id, request = request.as_str(), "records access");

        state.response = match request {
            RecordsRequest::MedicalHistory => medical_history(records, &patient.id),
            RecordsRequest::Medications => medications(records, &patient.id),
            RecordsRequest::Allergies => allergies(records, &patient.id),
            RecordsRequest::TestResults => test_results(),
            RecordsRequest::Summary => summary(records, patient),
            RecordsRequest::Update => update(),
            RecordsRequest::General | RecordsRequest::PatientNotFound => general(),
        };
        state.outcome = HandlerOutcome::Records { request };

        Ok(())
    }

    pub fn apply_fallback(state: &mut ConversationState) {
        state.response = fallback_response();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{sample_data, ClinicData};

    fn run(message: &str, patient: &str) -> ConversationState {
        let records = RecordStore::in_memory(sample_data());
        let mut state = ConversationState::new(message, Some(patient), "");
        RecordsAgent::new().handle(&mut state, &records).unwrap();
        state
    }

    #[test]
    fn test_analyze_order() {
        assert_eq!(RecordsRequest::analyze("my medical history"), RecordsRequest::MedicalHistory);
        assert_eq!(RecordsRequest::analyze("what pills do I take"), RecordsRequest::Medications);
        assert_eq!(RecordsRequest::analyze("am I allergic to anything"), RecordsRequest::Allergies);
        assert_eq!(RecordsRequest::analyze("my blood work"), RecordsRequest::TestResults);
        assert_eq!(RecordsRequest::analyze("give me an overview"), RecordsRequest::Summary);
        assert_eq!(RecordsRequest::analyze("I need to correct my address"), RecordsRequest::Update);
        assert_eq!(RecordsRequest::analyze("records please"), RecordsRequest::General);
    }

    #[test]
    fn test_history() {
        let state = run("show my medical history", "patient-001");
        assert!(state.response.contains("• **Hypertension**"));
        assert!(state.response.contains("📊 Status: Active"));
        assert_eq!(state.outcome, HandlerOutcome::Records { request: RecordsRequest::MedicalHistory });
    }

    #[test]
    fn test_medications() {
        let state = run("what medications am I on", "patient-003");
        assert!(state.response.contains("• **Warfarin**"));
        assert!(state.response.contains("Dosage: 5mg"));
        assert!(state.response.contains("Medication Safety"));
    }

    #[test]
    fn test_allergies_empty_and_present() {
        let state = run("do I have allergies", "patient-002");
        assert!(state.response.starts_with("Your records show no known allergies on file."));

        let state = run("do I have allergies", "patient-001");
        assert!(state.response.contains("• **Penicillin**"));
        assert!(state.response.contains("call 911 immediately"));
    }

    #[test]
    fn test_summary() {
        let state = run("I want a summary", "patient-002");
        assert!(state.response.contains("Medical Records Summary for Emily Davis"));
        assert!(state.response.contains("• Asthma (2008-05-10)"));
        assert!(state.response.contains("• Albuterol inhaler - 90mcg As needed"));
        assert!(state.response.contains("• No known allergies on file"));
    }

    #[test]
    fn test_static_sections() {
        assert!(run("lab results?", "patient-001").response.contains(PATIENT_PORTAL));
        assert!(run("please update my phone", "patient-001").response.contains("Updating Medical Records"));
        assert!(run("records please", "patient-001").response.contains("Example Requests"));
    }

    #[test]
    fn test_unknown_patient() {
        let state = run("my medical history", "patient-999");
        assert!(state.response.contains("couldn't find your medical records"));
        assert_eq!(state.outcome, HandlerOutcome::Records { request: RecordsRequest::PatientNotFound });
    }

    #[test]
    fn test_empty_store_is_error() {
        let mut state = ConversationState::new("history", Some("patient-001"), "");
        let records = RecordStore::in_memory(ClinicData::default());
        assert!(RecordsAgent::new().handle(&mut state, &records).is_err());

        RecordsAgent::apply_fallback(&mut state);
        assert!(state.response.contains("patient portal"));
    }
}
