//! Routine questions: office FAQs, canned topics and general health tips

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agents::{contains_any, BILLING_PHONE, OFFICE_PHONE, PATIENT_PORTAL};
use crate::errors::{CareError, Result};
use crate::graph::state::{ConversationState, HandlerOutcome};
use crate::llm::ChatModel;
use crate::records::{Faq, RecordStore};

const ROUTINE_PROMPT: &str = r#"You are a helpful medical office assistant AI. Answer the patient's question using the provided information and your knowledge.

PATIENT QUESTION:
{question}

RELEVANT FAQ INFORMATION:
{relevant_faqs}

ADDITIONAL CONTEXT:
{context}

GUIDELINES:
1. Be helpful, professional, and empathetic
2. Use the FAQ information when relevant
3. For medical advice: Always recommend consulting with healthcare providers
4. For office procedures: Provide clear, specific information
5. If unsure: Direct to call the office or speak with medical staff
6. Keep responses concise but complete
7. Use a warm, caring tone appropriate for healthcare

IMPORTANT DISCLAIMERS:
- You cannot provide specific medical diagnoses or treatment recommendations
- Always recommend consulting healthcare providers for medical concerns
- For urgent matters, direct patients to appropriate care levels

Provide a helpful, accurate response to the patient's question.
"#;

/// Added to the base temperature for more natural answers
const ROUTINE_WARMTH: f32 = 0.3;

const MAX_TEMPERATURE: f32 = 2.0;

const MAX_FAQS: usize = 3;

const OFFICE_HOURS: &str = "Our office hours are:\n\
• Monday-Friday: 8:00 AM - 6:00 PM\n\
• Saturday: 9:00 AM - 2:00 PM\n\
• Sunday: Closed\n\
• Holidays: Closed";

const INSURANCE: &str = "We accept most major insurance plans including Blue Cross Blue Shield, Aetna, Cigna, UnitedHealthcare, and Medicare. Please contact our office to verify your specific plan coverage.";

const PRESCRIPTION_REFILLS: &str = "For prescription refills, you can:\n\
• Use our patient portal online\n\
• Call our office during business hours\n\
• Contact your pharmacy directly\n\n\
Please allow 2-3 business days for processing.";

const LAB_RESULTS: &str = "Lab results are typically available within 2-3 business days. You can check your results through:\n\
• Our patient portal\n\
• Calling our office";

const PREPARATION: &str = "For your appointment, please bring:\n\
• Valid photo ID\n\
• Insurance card\n\
• List of current medications\n\
• Any relevant medical records\n\
• Arrive 15 minutes early for check-in";

/// Canned answer for well-known office topics
pub fn common_topic(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();

    if contains_any(&lower, &["hours", "open", "closed", "time"]) {
        Some(OFFICE_HOURS)
    } else if contains_any(&lower, &["insurance", "coverage", "plan", "billing"]) {
        Some(INSURANCE)
    } else if contains_any(&lower, &["prescription", "refill", "medication", "pills"]) {
        Some(PRESCRIPTION_REFILLS)
    } else if contains_any(&lower, &["lab", "test", "results", "blood work"]) {
        Some(LAB_RESULTS)
    } else if contains_any(&lower, &["bring", "prepare", "preparation", "what to bring"]) {
        Some(PREPARATION)
    } else {
        None
    }
}

/// FAQs matching the whole question, else its longer words; at most three
pub fn relevant_faqs<'a>(records: &'a RecordStore, question: &str) -> Vec<&'a Faq> {
    let mut found = records.search_faqs(question);

    if found.is_empty() {
        for word in question.to_lowercase().split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.chars().count() <= 3 {
                continue;
            }
            for faq in records.search_faqs(word) {
                if !found.iter().any(|f| std::ptr::eq(*f, faq)) {
                    found.push(faq);
                }
            }
            if found.len() >= MAX_FAQS {
                break;
            }
        }
    }

    found.truncate(MAX_FAQS);
    found
}

/// Suggestion and contact block appended to every routine reply
pub fn followup(question: &str) -> String {
    let lower = question.to_lowercase();

    let suggestion = if contains_any(&lower, &["appointment", "schedule", "book"]) {
        "💡 **Need help with appointments?** I can help you schedule, reschedule, or check your upcoming appointments.".to_string()
    } else if contains_any(&lower, &["symptom", "pain", "feeling", "sick"]) {
        "⚠️ **For medical concerns:** Please consult with our healthcare providers. If urgent, don't hesitate to call or visit.".to_string()
    } else if contains_any(&lower, &["billing", "payment", "cost"]) {
        format!(
            "💰 **Billing questions?** Our billing department is available at {} or billing@hospital.com.",
            BILLING_PHONE
        )
    } else if contains_any(&lower, &["portal", "online", "website"]) {
        format!(
            "🌐 **Online services:** Visit our patient portal at {} to access your records, schedule appointments, and more.",
            PATIENT_PORTAL
        )
    } else {
        format!(
            "❓ **Still have questions?** Feel free to ask me anything else, or call our office at {}.",
            OFFICE_PHONE
        )
    };

    format!(
        "\n\n{}\n\n📞 **Contact Us:**\n• Phone: {}\n• Emergency: 911\n• Online: {}",
        suggestion, OFFICE_PHONE, PATIENT_PORTAL
    )
}

/// Short advice on a general wellness topic
pub fn health_tip(topic: &str) -> &'static str {
    match topic.trim().to_lowercase().as_str() {
        "hydration" => "Staying hydrated is important for overall health. Aim for 8 glasses of water daily, more if you're active or in hot weather. Signs of good hydration include pale yellow urine and feeling energetic.",
        "exercise" => "Regular exercise is beneficial for physical and mental health. Aim for at least 150 minutes of moderate exercise weekly. Always consult your doctor before starting a new exercise program.",
        "sleep" => "Quality sleep is essential for health. Most adults need 7-9 hours nightly. Good sleep hygiene includes consistent bedtimes, avoiding screens before bed, and creating a comfortable sleep environment.",
        "nutrition" => "A balanced diet includes fruits, vegetables, lean proteins, and whole grains. Limit processed foods, sugar, and excessive sodium. Consult our nutritionist for personalized dietary advice.",
        "stress" => "Managing stress is important for overall wellness. Techniques include deep breathing, meditation, regular exercise, and talking to friends or professionals. Don't hesitate to seek support when needed.",
        _ => "For specific health information, please consult with our healthcare providers who can give you personalized advice based on your individual health needs.",
    }
}

/// Static reply used when no answer can be produced
pub fn fallback_response() -> String {
    format!(
        "I apologize, but I'm having trouble accessing our information system right now.

For immediate assistance, please:

📞 **Call our office:** {phone}
🕐 **Office Hours:** Monday-Friday 8 AM - 6 PM, Saturday 9 AM - 2 PM
🌐 **Online Portal:** {portal}

**Common Information:**
• We accept most major insurance plans
• Prescription refills: Allow 2-3 business days
• Lab results: Available in 2-3 business days
• For appointments: Call or use our online portal

**Emergency:** If this is urgent, please call 911 or visit the emergency room.",
        phone = OFFICE_PHONE,
        portal = PATIENT_PORTAL
    )
}

/// Routine question handler
pub struct RoutineAgent {
    llm: Arc<dyn ChatModel>,
    base_temperature: f32,
}

impl RoutineAgent {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self {
            llm,
            base_temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, base_temperature: f32) -> Self {
        self.base_temperature = base_temperature;
        self
    }

    fn temperature(&self) -> f32 {
        (self.base_temperature + ROUTINE_WARMTH).min(MAX_TEMPERATURE)
    }

    async fn generate(&self, question: &str, faqs: &[&Faq], context: &str) -> String {
        let faqs_text = if faqs.is_empty() {
            "No specific FAQ information available for this question.".to_string()
        } else {
            faqs.iter()
                .map(|f| format!("Q: {}\nA: {}\n", f.question, f.answer))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = ROUTINE_PROMPT
            .replace("{question}", question)
            .replace("{relevant_faqs}", &faqs_text)
            .replace("{context}", context);

        match self.llm.complete(&prompt, self.temperature()).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "routine model failed, using fallback");
                fallback_response()
            }
        }
    }

    pub async fn handle(&self, state: &mut ConversationState, records: &RecordStore) -> Result<()> {
        if records.is_empty() {
            return Err(CareError::Records("clinic records unavailable".to_string()));
        }

        info!(patient_id = %state.patient_id, "processing routine query");

        let faqs = relevant_faqs(records, &state.message);
        debug!(faqs = faqs.len(), "relevant FAQs");

        let answer = match common_topic(&state.message) {
            Some(canned) => canned.to_string(),
            None => self.generate(&state.message, &faqs, &state.context).await,
        };

        state.response = format!("{}{}", answer, followup(&state.message));
        state.outcome = HandlerOutcome::Routine { faqs_used: faqs.len() };
        Ok(())
    }

    pub fn apply_fallback(state: &mut ConversationState) {
        state.response = fallback_response();
    }
}
