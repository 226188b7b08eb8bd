//! Workflow stage machine and the conversation state it threads
//!
//! Every message walks the same deterministic machine:
//!
//! ```text
//! Classify ──Routed(intent)──▶ Emergency | Scheduling | Records | Routine
//!    │                                    │
//!    └──ClassifyFailed──▶ Finalize ◀──HandlerComplete
//!                            │
//!                        Finalized ──▶ Persist ──Persisted──▶ Done
//! ```
//!
//! `Done` is terminal and absorbs every event.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agents::emergency::EmergencyType;
use crate::agents::records::RecordsRequest;
use crate::agents::scheduler::ScheduleRequest;
use crate::errors::{CareError, Result};

/// Patient id used when the caller gives none
pub const DEFAULT_PATIENT_ID: &str = "default_patient";

/// Classified purpose of a patient message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Emergency,
    Appointment,
    MedicalRecords,
    Routine,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::Emergency,
        Intent::Appointment,
        Intent::MedicalRecords,
        Intent::Routine,
    ];

    /// Parse a classifier label, ignoring case and surrounding quotes
    pub fn parse(label: &str) -> Option<Intent> {
        let label = label
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '[' || c == ']')
            .to_lowercase();
        match label.as_str() {
            "emergency" => Some(Intent::Emergency),
            "appointment" => Some(Intent::Appointment),
            "medical_records" => Some(Intent::MedicalRecords),
            "routine" => Some(Intent::Routine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Emergency => "emergency",
            Intent::Appointment => "appointment",
            Intent::MedicalRecords => "medical_records",
            Intent::Routine => "routine",
        }
    }

    /// Handler stage this intent dispatches to
    pub fn stage(&self) -> Stage {
        match self {
            Intent::Emergency => Stage::Emergency,
            Intent::Appointment => Stage::Scheduling,
            Intent::MedicalRecords => Stage::Records,
            Intent::Routine => Stage::Routine,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Decide the intent of the message
    Classify,

    /// Specialized handlers
    Emergency,
    Scheduling,
    Records,
    Routine,

    /// Ensure a reply exists and append the closing line
    Finalize,

    /// Save memory, session file and telemetry
    Persist,

    /// Terminal
    Done,
}

/// Outcome of running a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent {
    /// Classification produced an intent
    Routed(Intent),

    /// Classification produced no usable intent
    ClassifyFailed,

    /// A handler wrote its reply (possibly a fallback)
    HandlerComplete,

    Finalized,

    Persisted,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done)
    }

    pub fn is_handler(&self) -> bool {
        matches!(
            self,
            Stage::Emergency | Stage::Scheduling | Stage::Records | Stage::Routine
        )
    }

    /// Attempt a transition
    ///
    /// Valid edges:
    /// 1. Classify → handler for the intent (on: Routed)
    /// 2. Classify → Finalize (on: ClassifyFailed)
    /// 3. handler  → Finalize (on: HandlerComplete)
    /// 4. Finalize → Persist  (on: Finalized)
    /// 5. Persist  → Done     (on: Persisted)
    /// 6. Done     → Done     (terminal)
    pub fn transition(&self, event: StageEvent) -> Result<Stage> {
        use Stage::*;
        use StageEvent::*;

        let next = match (self, event) {
            (Classify, Routed(intent)) => intent.stage(),
            (Classify, ClassifyFailed) => Finalize,

            (stage, HandlerComplete) if stage.is_handler() => Finalize,

            (Finalize, Finalized) => Persist,
            (Persist, Persisted) => Done,

            (Done, _) => Done,

            (from, event) => {
                return Err(CareError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    /// Events accepted from this stage
    pub fn valid_events(&self) -> Vec<StageEvent> {
        use Stage::*;
        use StageEvent::*;

        match self {
            Classify => {
                let mut events: Vec<StageEvent> = Intent::ALL.iter().map(|i| Routed(*i)).collect();
                events.push(ClassifyFailed);
                events
            }
            Emergency | Scheduling | Records | Routine => vec![HandlerComplete],
            Finalize => vec![Finalized],
            Persist => vec![Persisted],
            Done => Vec::new(),
        }
    }

    /// Short name used in logs and error records
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Classify => "classify",
            Stage::Emergency => "emergency",
            Stage::Scheduling => "scheduling",
            Stage::Records => "records",
            Stage::Routine => "routine",
            Stage::Finalize => "finalize",
            Stage::Persist => "persist",
            Stage::Done => "done",
        }
    }

    /// Human-readable stage name
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Classify => "Classifying Intent",
            Stage::Emergency => "Emergency Response",
            Stage::Scheduling => "Scheduling",
            Stage::Records => "Medical Records",
            Stage::Routine => "General Questions",
            Stage::Finalize => "Building Reply",
            Stage::Persist => "Saving Conversation",
            Stage::Done => "Completed",
        }
    }
}

/// Handler-specific details of a processed message
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HandlerOutcome {
    #[default]
    None,
    Emergency {
        emergency_type: EmergencyType,
        alert_id: Option<String>,
        alert_sent: bool,
    },
    Scheduling {
        request: ScheduleRequest,
    },
    Records {
        request: RecordsRequest,
    },
    Routine {
        faqs_used: usize,
    },
}

/// Error recorded by a stage; never aborts the run
#[derive(Debug, Clone, PartialEq)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage.name(), self.message)
    }
}

/// State threaded through every stage of one message
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub patient_id: String,
    pub message: String,
    pub context: String,
    pub session_id: String,
    pub started_at: DateTime<Local>,

    pub intent: Option<Intent>,
    /// 1..=10
    pub confidence: u8,
    /// 0..=10
    pub urgency: u8,
    pub reasoning: String,

    pub response: String,
    /// Set by finalize, `%Y-%m-%d %H:%M:%S`
    pub timestamp: Option<String>,
    pub outcome: HandlerOutcome,

    pub errors: Vec<StageError>,
    pub memory_updated: bool,
    /// A stage replaced its output with a static fallback
    pub used_fallback: bool,
}

impl ConversationState {
    pub fn new(message: &str, patient_id: Option<&str>, context: &str) -> Self {
        let now = Local::now();
        let patient_id = patient_id
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PATIENT_ID);

        Self {
            patient_id: patient_id.to_string(),
            message: message.to_string(),
            context: context.to_string(),
            session_id: format!("session_{}", now.timestamp()),
            started_at: now,
            intent: None,
            confidence: 0,
            urgency: 0,
            reasoning: String::new(),
            response: String::new(),
            timestamp: None,
            outcome: HandlerOutcome::None,
            errors: Vec::new(),
            memory_updated: false,
            used_fallback: false,
        }
    }

    /// Record a stage error
    pub fn record_error(&mut self, stage: Stage, message: impl Into<String>) {
        self.errors.push(StageError {
            stage,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when the patient is the placeholder id
    pub fn is_anonymous(&self) -> bool {
        self.patient_id == DEFAULT_PATIENT_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_transitions() {
        assert_eq!(
            Stage::Classify.transition(StageEvent::Routed(Intent::Emergency)).unwrap(),
            Stage::Emergency
        );
        assert_eq!(
            Stage::Classify.transition(StageEvent::Routed(Intent::Appointment)).unwrap(),
            Stage::Scheduling
        );
        assert_eq!(
            Stage::Classify.transition(StageEvent::Routed(Intent::MedicalRecords)).unwrap(),
            Stage::Records
        );
        assert_eq!(
            Stage::Classify.transition(StageEvent::Routed(Intent::Routine)).unwrap(),
            Stage::Routine
        );
        assert_eq!(
            Stage::Classify.transition(StageEvent::ClassifyFailed).unwrap(),
            Stage::Finalize
        );
    }

    #[test]
    fn test_handlers_lead_to_finalize() {
        for stage in [Stage::Emergency, Stage::Scheduling, Stage::Records, Stage::Routine] {
            assert_eq!(stage.transition(StageEvent::HandlerComplete).unwrap(), Stage::Finalize);
        }
    }

    #[test]
    fn test_tail_transitions() {
        assert_eq!(Stage::Finalize.transition(StageEvent::Finalized).unwrap(), Stage::Persist);
        assert_eq!(Stage::Persist.transition(StageEvent::Persisted).unwrap(), Stage::Done);
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(Stage::Classify.transition(StageEvent::HandlerComplete).is_err());
        assert!(Stage::Emergency.transition(StageEvent::Finalized).is_err());
        assert!(Stage::Finalize.transition(StageEvent::Routed(Intent::Routine)).is_err());
        assert!(Stage::Persist.transition(StageEvent::HandlerComplete).is_err());
        assert!(Stage::Classify.transition(StageEvent::Persisted).is_err());
    }

    #[test]
    fn test_done_is_absorbing() {
        assert!(Stage::Done.is_terminal());
        assert_eq!(Stage::Done.transition(StageEvent::Finalized).unwrap(), Stage::Done);
        assert_eq!(
            Stage::Done.transition(StageEvent::Routed(Intent::Emergency)).unwrap(),
            Stage::Done
        );
    }

    #[test]
    fn test_valid_events_are_accepted() {
        let stages = [
            Stage::Classify,
            Stage::Emergency,
            Stage::Scheduling,
            Stage::Records,
            Stage::Routine,
            Stage::Finalize,
            Stage::Persist,
        ];
        for stage in stages {
            for event in stage.valid_events() {
                assert!(stage.transition(event).is_ok(), "{:?} rejects {:?}", stage, event);
            }
        }
        assert!(Stage::Done.valid_events().is_empty());
    }

    #[test]
    fn test_every_path_reaches_done() {
        let mut routes: Vec<StageEvent> = Intent::ALL.iter().map(|i| StageEvent::Routed(*i)).collect();
        routes.push(StageEvent::ClassifyFailed);

        for route in routes {
            let mut stage = Stage::Classify.transition(route).unwrap();
            let mut steps = 0;
            while !stage.is_terminal() {
                let event = stage.valid_events()[0];
                stage = stage.transition(event).unwrap();
                steps += 1;
                assert!(steps < 10);
            }
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Stage::Classify.display_name(), "Classifying Intent");
        assert_eq!(Stage::Done.display_name(), "Completed");
        assert_eq!(Stage::Records.name(), "records");
    }

    #[test]
    fn test_intent_parse() {
        assert_eq!(Intent::parse("emergency"), Some(Intent::Emergency));
        assert_eq!(Intent::parse(" Appointment "), Some(Intent::Appointment));
        assert_eq!(Intent::parse("MEDICAL_RECORDS"), Some(Intent::MedicalRecords));
        assert_eq!(Intent::parse("\"routine\""), Some(Intent::Routine));
        assert_eq!(Intent::parse("billing"), None);
        assert_eq!(Intent::parse(""), None);
    }

    #[test]
    fn test_intent_round_trip_labels() {
        for intent in Intent::ALL {
            assert_eq!(Intent::parse(intent.as_str()), Some(intent));
            assert_eq!(intent.to_string(), intent.as_str());
        }
    }

    #[test]
    fn test_new_state_defaults() {
        let state = ConversationState::new("hello", None, "");
        assert_eq!(state.patient_id, DEFAULT_PATIENT_ID);
        assert!(state.is_anonymous());
        assert!(state.session_id.starts_with("session_"));
        assert!(state.intent.is_none());
        assert!(!state.has_errors());

        let state = ConversationState::new("hello", Some("  "), "");
        assert_eq!(state.patient_id, DEFAULT_PATIENT_ID);

        let state = ConversationState::new("hello", Some("patient-001"), "follow-up");
        assert_eq!(state.patient_id, "patient-001");
        assert_eq!(state.context, "follow-up");
    }

    #[test]
    fn test_record_error() {
        let mut state = ConversationState::new("hi", None, "");
        state.record_error(Stage::Classify, "boom");
        assert!(state.has_errors());
        assert_eq!(state.errors[0].to_string(), "classify: boom");
    }
}
