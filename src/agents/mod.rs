//! Specialized message handlers
//!
//! Components:
//! - Intent: keyword fast-path plus model classification
//! - Emergency: protocols, guidance and alerting
//! - Scheduler: appointment booking, rescheduling and cancellation
//! - Records: read-only access to the patient's chart
//! - Routine: office FAQs and general questions
//!
//! Handlers never fail because the model failed; they fall back to static
//! text. They return `Err` only when the record store cannot serve them, and
//! the workflow then substitutes the stage fallback.

pub mod emergency;
pub mod intent;
pub mod records;
pub mod routine;
pub mod scheduler;

pub use emergency::{EmergencyAgent, EmergencyType};
pub use intent::{Classification, ClassificationSource, IntentClassifier};
pub use records::{RecordsAgent, RecordsRequest};
pub use routine::RoutineAgent;
pub use scheduler::{ScheduleRequest, SchedulerAgent};

/// Main office line
pub const OFFICE_PHONE: &str = "(555) 123-4567";

/// Billing department line
pub const BILLING_PHONE: &str = "(555) 123-4568";

/// Patient portal host
pub const PATIENT_PORTAL: &str = "patient.hospital.com";

/// Contact block appended to emergency replies
pub const EMERGENCY_CONTACTS: &str = "**Emergency Contacts:**\n\
• Emergency Services: 911\n\
• Poison Control: 1-800-222-1222\n\
• Crisis Text Line: Text HOME to 741741";

/// True if `text` contains any of `words`
pub(crate) fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}
