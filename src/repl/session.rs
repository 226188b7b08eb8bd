//! Chat session state for the REPL
//!
//! Tracks the active patient and a bounded log of exchanges. The last few
//! exchanges are fed back to the handlers as conversation context.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::Instant;

use crate::graph::state::{ConversationState, Intent};

/// Exchanges kept for `/stats` and context building
const MAX_EXCHANGES: usize = 200;

/// Exchanges included in the handler context
const MAX_CONTEXT_EXCHANGES: usize = 3;

/// One handled message
#[derive(Debug, Clone)]
pub struct ExchangeRecord {
    pub message: String,
    pub intent: Option<Intent>,
    pub urgency: u8,
    pub used_fallback: bool,
    pub duration_ms: u64,
    pub timestamp: DateTime<Local>,
}

impl ExchangeRecord {
    pub fn from_state(state: &ConversationState, duration_ms: u64) -> Self {
        Self {
            message: state.message.clone(),
            intent: state.intent,
            urgency: state.urgency,
            used_fallback: state.used_fallback,
            duration_ms,
            timestamp: Local::now(),
        }
    }
}

pub struct ChatSession {
    patient_id: Option<String>,
    exchanges: VecDeque<ExchangeRecord>,
    started: Instant,
}

impl ChatSession {
    pub fn new(patient_id: Option<String>) -> Self {
        Self {
            patient_id,
            exchanges: VecDeque::with_capacity(MAX_EXCHANGES),
            started: Instant::now(),
        }
    }

    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    /// Switch patient. Context from the previous patient is dropped.
    pub fn set_patient(&mut self, patient_id: Option<String>) {
        if self.patient_id != patient_id {
            self.exchanges.clear();
        }
        self.patient_id = patient_id;
    }

    pub fn record(&mut self, record: ExchangeRecord) {
        if self.exchanges.len() >= MAX_EXCHANGES {
            self.exchanges.pop_front();
        }
        self.exchanges.push_back(record);
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &ExchangeRecord> {
        self.exchanges.iter()
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.len()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Context string for the next message, empty when nothing happened yet
    pub fn build_context(&self) -> String {
        if self.exchanges.is_empty() {
            return String::new();
        }

        let mut context = String::from("Recent conversation:\n");
        let skip = self.exchanges.len().saturating_sub(MAX_CONTEXT_EXCHANGES);
        for record in self.exchanges.iter().skip(skip) {
            let intent = record.intent.map(|i| i.as_str()).unwrap_or("unclassified");
            context.push_str(&format!("- Patient asked: {} ({})\n", record.message, intent));
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(message: &str, intent: Option<Intent>) -> ExchangeRecord {
        ExchangeRecord {
            message: message.to_string(),
            intent,
            urgency: 0,
            used_fallback: false,
            duration_ms: 10,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn test_empty_context() {
        let session = ChatSession::new(None);
        assert_eq!(session.build_context(), "");
    }

    #[test]
    fn test_context_uses_last_exchanges() {
        let mut session = ChatSession::new(Some("patient-001".to_string()));
        session.record(record("first", Some(Intent::Routine)));
        session.record(record("second", Some(Intent::Appointment)));
        session.record(record("third", None));
        session.record(record("fourth", Some(Intent::MedicalRecords)));

        let context = session.build_context();
        assert!(!context.contains("first"));
        assert!(context.contains("second (appointment)"));
        assert!(context.contains("third (unclassified)"));
        assert!(context.contains("fourth (medical_records)"));
    }

    #[test]
    fn test_bounded_log() {
        let mut session = ChatSession::new(None);
        for i in 0..(MAX_EXCHANGES + 5) {
            session.record(record(&format!("m{}", i), None));
        }
        assert_eq!(session.exchange_count(), MAX_EXCHANGES);
        assert_eq!(session.exchanges().next().unwrap().message, "m5");
    }

    #[test]
    fn test_switching_patient_drops_context() {
        let mut session = ChatSession::new(Some("patient-001".to_string()));
        session.record(record("hello", None));

        session.set_patient(Some("patient-001".to_string()));
        assert_eq!(session.exchange_count(), 1);

        session.set_patient(Some("patient-002".to_string()));
        assert_eq!(session.exchange_count(), 0);
        assert_eq!(session.patient_id(), Some("patient-002"));
    }
}
