//! Per-patient conversation memory
//!
//! Keeps a bounded FIFO of turns plus a small key/value medical context
//! (last intent, urgency, session id). The oldest turn is evicted once the
//! configured capacity is reached.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tracing::debug;

/// Default number of turns kept per patient
pub const DEFAULT_MAX_TURNS: usize = 50;

/// Who said it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Patient,
    Assistant,
}

impl Speaker {
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::Patient => "Patient",
            Speaker::Assistant => "Assistant",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Local>,
}

impl Turn {
    fn new(speaker: Speaker, content: &str) -> Self {
        Self {
            speaker,
            content: content.to_string(),
            timestamp: Local::now(),
        }
    }
}

/// Serialized form of a patient's memory, written to the session file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub patient_id: String,
    pub session_start: DateTime<Local>,
    pub conversation_history: Vec<Turn>,
    #[serde(default)]
    pub medical_context: Map<String, Value>,
    #[serde(default)]
    pub summary: String,
}

/// Conversation memory for one patient
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    patient_id: String,
    turns: VecDeque<Turn>,
    max_turns: usize,
    medical_context: Map<String, Value>,
    session_start: DateTime<Local>,
}

impl ConversationMemory {
    pub fn new(patient_id: &str) -> Self {
        Self::with_capacity(patient_id, DEFAULT_MAX_TURNS)
    }

    /// Memory holding at most `max_turns` turns (minimum 2, one exchange)
    pub fn with_capacity(patient_id: &str, max_turns: usize) -> Self {
        let max_turns = max_turns.max(2);
        Self {
            patient_id: patient_id.to_string(),
            turns: VecDeque::with_capacity(max_turns),
            max_turns,
            medical_context: Map::new(),
            session_start: Local::now(),
        }
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    fn push(&mut self, turn: Turn) {
        if self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Record a patient message and the reply; metadata is merged into the
    /// medical context
    pub fn save_interaction(&mut self, message: &str, response: &str, metadata: Map<String, Value>) {
        self.push(Turn::new(Speaker::Patient, message));
        self.push(Turn::new(Speaker::Assistant, response));
        self.medical_context.extend(metadata);
        debug!(patient_id = %self.patient_id, turns = self.turns.len(), "saved interaction");
    }

    pub fn history(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Conversation with {} messages since {}",
            self.turns.len(),
            self.session_start.format("%Y-%m-%d %H:%M:%S")
        )
    }

    pub fn update_context(&mut self, update: Map<String, Value>) {
        self.medical_context.extend(update);
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.medical_context
    }

    /// Drop every turn and the medical context
    pub fn clear(&mut self) {
        self.turns.clear();
        self.medical_context.clear();
        debug!(patient_id = %self.patient_id, "cleared memory");
    }

    pub fn export(&self) -> SessionExport {
        SessionExport {
            patient_id: self.patient_id.clone(),
            session_start: self.session_start,
            conversation_history: self.history(),
            medical_context: self.medical_context.clone(),
            summary: self.summary(),
        }
    }

    /// Replace this memory's contents with an exported session. The
    /// owning patient id never changes.
    pub fn restore(&mut self, export: SessionExport) {
        self.session_start = export.session_start;
        self.medical_context = export.medical_context;
        self.turns.clear();
        for turn in export.conversation_history {
            self.push(turn);
        }
    }
}
