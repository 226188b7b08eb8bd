//! Appointment scheduling handler

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use crate::agents::{contains_any, OFFICE_PHONE};
use crate::errors::{CareError, Result};
use crate::graph::state::{ConversationState, HandlerOutcome};
use crate::llm::ChatModel;
use crate::records::{Appointment, Doctor, RecordStore};

const SCHEDULING_PROMPT: &str = r#"You are a medical appointment scheduling assistant. Help the patient with their scheduling request.

PATIENT INFORMATION:
{patient_info}

CURRENT APPOINTMENTS:
{current_appointments}

SCHEDULING REQUEST:
{request}

AVAILABLE TIME SLOTS:
{available_slots}

INSTRUCTIONS:
1. Understand what the patient wants (book, reschedule, cancel, check appointments)
2. If booking: suggest appropriate time slots and doctors
3. If rescheduling: identify the appointment and suggest new times
4. If canceling: confirm which appointment to cancel
5. Provide clear, helpful responses with specific options
6. Ask for clarification if the request is unclear

Provide a helpful response and specify any actions that need to be taken.
"#;

/// Tried in order; the first match is the preferred time
const TIME_PATTERNS: &[&str] = &[
    r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
    r"(monday|tuesday|wednesday|thursday|friday|saturday|sunday)",
    r"(tomorrow|next week|this week)",
    r"(morning|afternoon|evening)",
];

fn time_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| TIME_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect())
}

/// What the patient wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRequest {
    Book,
    Reschedule,
    Cancel,
    Check,
    General,
}

impl ScheduleRequest {
    /// First match wins: book, reschedule, cancel, check. "schedule" is a
    /// booking keyword, so "reschedule" on its own books.
    pub fn analyze(message: &str) -> Self {
        let lower = message.to_lowercase();

        if contains_any(&lower, &["book", "schedule", "make appointment", "new appointment"]) {
            ScheduleRequest::Book
        } else if contains_any(&lower, &["reschedule", "change", "move", "different time"]) {
            ScheduleRequest::Reschedule
        } else if contains_any(&lower, &["cancel", "delete", "remove"]) {
            ScheduleRequest::Cancel
        } else if contains_any(&lower, &["check", "see", "view", "list", "my appointments"]) {
            ScheduleRequest::Check
        } else {
            ScheduleRequest::General
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleRequest::Book => "book",
            ScheduleRequest::Reschedule => "reschedule",
            ScheduleRequest::Cancel => "cancel",
            ScheduleRequest::Check => "check",
            ScheduleRequest::General => "general",
        }
    }
}

/// Preferences pulled out of a booking request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulingPreferences {
    pub preferred_time: Option<String>,
    pub specialty: Option<&'static str>,
}

impl SchedulingPreferences {
    pub fn extract(message: &str) -> Self {
        let lower = message.to_lowercase();

        let preferred_time = time_patterns()
            .iter()
            .find_map(|re| re.captures(&lower))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());

        let specialty = if contains_any(&lower, &["cardiologist", "heart"]) {
            Some("Cardiology")
        } else if contains_any(&lower, &["dermatologist", "skin"]) {
            Some("Dermatology")
        } else if contains_any(&lower, &["general", "primary"]) {
            Some("Internal Medicine")
        } else {
            None
        };

        Self {
            preferred_time,
            specialty,
        }
    }
}

/// Up to three doctors with their first three slots
pub fn format_slots(records: &RecordStore, doctors: &[&Doctor]) -> String {
    let mut text = String::new();

    for doctor in doctors.iter().take(3) {
        let slots = records.doctor_availability(&doctor.id);
        if slots.is_empty() {
            continue;
        }
        text.push_str(&format!("**{} ({})**:\n", doctor.name, doctor.specialty));
        for slot in slots.iter().take(3) {
            text.push_str(&format!("  • {}\n", slot));
        }
        text.push('\n');
    }

    if text.is_empty() {
        format!("Please call {} to check current availability.", OFFICE_PHONE)
    } else {
        text
    }
}

fn format_appointment_list(appointments: &[&Appointment]) -> String {
    let mut text = String::from("Here are your current appointments:\n\n");
    for (i, appt) in appointments.iter().enumerate() {
        text.push_str(&format!(
            "{}. **{}** - {} at {}\n   Type: {}\n\n",
            i + 1,
            doctor_label(appt),
            appt.date,
            appt.time,
            kind_label(appt)
        ));
    }
    text
}

fn doctor_label(appt: &Appointment) -> &str {
    if appt.doctor.is_empty() {
        "Unknown Doctor"
    } else {
        &appt.doctor
    }
}

fn kind_label(appt: &Appointment) -> &str {
    if appt.kind.is_empty() {
        "Consultation"
    } else {
        &appt.kind
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

/// Static reply used when the scheduling handler cannot run at all
pub fn fallback_response() -> String {
    format!(
        "I'm having trouble accessing the scheduling system. Please call {}.",
        OFFICE_PHONE
    )
}

/// Scheduling handler
pub struct SchedulerAgent {
    llm: Arc<dyn ChatModel>,
    temperature: f32,
}

impl SchedulerAgent {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self {
            llm,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn handle(&self, state: &mut ConversationState, records: &RecordStore) -> Result<()> {
        if records.is_empty() {
            return Err(CareError::Records("clinic records unavailable".to_string()));
        }

        let request = ScheduleRequest::analyze(&state.message);
        info!(patient_id = %state.patient_id, request = request.as_str(), "processing scheduling request");

        let appointments = records.patient_appointments(&state.patient_id);

        let response = match request {
            ScheduleRequest::Book => self.book(state, records, &appointments).await,
            ScheduleRequest::Reschedule => reschedule(records, &appointments),
            ScheduleRequest::Cancel => cancel(&appointments),
            ScheduleRequest::Check => check(&appointments),
            ScheduleRequest::General => general(records),
        };
        state.response = response;
        state.outcome = HandlerOutcome::Scheduling { request };

        Ok(())
    }

    async fn book(
        &self,
        state: &ConversationState,
        records: &RecordStore,
        appointments: &[&Appointment],
    ) -> String {
        let preferences = SchedulingPreferences::extract(&state.message);
        let doctors = records.available_doctors(preferences.specialty);

        if doctors.is_empty() {
            return format!(
                "I'm sorry, but we don't have any doctors available for that specialty right now. Please call our office at {} for assistance.",
                OFFICE_PHONE
            );
        }

        let slots = format_slots(records, &doctors);
        let current = if appointments.is_empty() {
            "No current appointments".to_string()
        } else {
            appointments
                .iter()
                .map(|a| format!("• {} - {} at {}", a.doctor, a.date, a.time))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let mut request = state.message.clone();
        if let Some(time) = &preferences.preferred_time {
            request.push_str(&format!("\n(Preferred time: {})", time));
        }

        let prompt = SCHEDULING_PROMPT
            .replace("{patient_info}", &format!("Patient ID: {}", state.patient_id))
            .replace("{current_appointments}", &current)
            .replace("{request}", &request)
            .replace("{available_slots}", &slots);

        match self.llm.complete(&prompt, self.temperature).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "scheduling model failed, listing slots");
                format!(
                    "Here are the available time slots:\n\n{}\n\nPlease let me know which time works best for you!",
                    slots
                )
            }
        }
    }

    pub fn apply_fallback(state: &mut ConversationState) {
        state.response = fallback_response();
    }
}

fn reschedule(records: &RecordStore, appointments: &[&Appointment]) -> String {
    if appointments.is_empty() {
        return "I don't see any current appointments to reschedule. Would you like to book a new appointment instead?"
            .to_string();
    }

    let mut text = format_appointment_list(appointments);
    text.push_str("Which appointment would you like to reschedule? Please specify the doctor name or date.");

    let doctors = records.available_doctors(None);
    if !doctors.is_empty() {
        text.push_str(&format!("\n\n**Available New Times:**\n{}", format_slots(records, &doctors)));
    }

    text
}

fn cancel(appointments: &[&Appointment]) -> String {
    if appointments.is_empty() {
        return "I don't see any current appointments to cancel.".to_string();
    }

    let mut text = format_appointment_list(appointments);
    text.push_str("Which appointment would you like to cancel? Please specify the doctor name or date.\n\n");
    text.push_str("⚠️ **Cancellation Policy:** Please cancel at least 24 hours in advance to avoid fees.");
    text
}

fn check(appointments: &[&Appointment]) -> String {
    if appointments.is_empty() {
        return "You don't have any upcoming appointments scheduled.\n\nWould you like to book a new appointment? I can help you find available times with our doctors."
            .to_string();
    }

    let mut text = String::from("📅 **Your Upcoming Appointments:**\n\n");
    for appt in appointments {
        let status = if appt.status.is_empty() { "scheduled" } else { &appt.status };
        text.push_str(&format!(
            "• **{}**\n  📅 {} at {}\n  🏥 {}\n  📋 Status: {}\n\n",
            doctor_label(appt),
            appt.date,
            appt.time,
            kind_label(appt),
            title_case(status)
        ));
    }
    text.push_str("Need to make changes? I can help you reschedule or cancel appointments.");
    text
}

fn general(records: &RecordStore) -> String {
    let mut text = String::from("I'm here to help with your appointments! I can assist you with:\n\n");
    text.push_str("📅 **Booking new appointments**\n");
    text.push_str("🔄 **Rescheduling existing appointments**\n");
    text.push_str("❌ **Canceling appointments**\n");
    text.push_str("📋 **Checking your current appointments**\n\n");

    let doctors = records.available_doctors(None);
    if !doctors.is_empty() {
        text.push_str("**Available Doctors:**\n");
        for doctor in doctors {
            text.push_str(&format!("• {} - {}\n", doctor.name, doctor.specialty));
        }
    }

    text.push_str("\nWhat would you like to do with your appointments?");
    text
}
