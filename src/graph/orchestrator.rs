//! Workflow orchestrator
//!
//! Runs each message through the stage machine in [`crate::graph::state`].
//! Stage failures are recorded on the state and replaced by that stage's
//! static reply, so every call yields a non-empty response.

use chrono::Local;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::agents::{
    EmergencyAgent, IntentClassifier, RecordsAgent, RoutineAgent, SchedulerAgent,
};
use crate::alerts::AlertManager;
use crate::cli::config::{default_emergency_keywords, Config};
use crate::errors::{CareError, Result};
use crate::graph::state::{ConversationState, HandlerOutcome, Intent, Stage, StageEvent};
use crate::llm::ChatModel;
use crate::memory::{ConversationMemory, SessionPersistence, Turn, DEFAULT_MAX_TURNS};
use crate::records::RecordStore;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};

/// Reply used when no stage produced one
pub const EMPTY_RESPONSE_APOLOGY: &str =
    "I apologize, but I couldn't process your request. Please contact our office at (555) 123-4567 for assistance.";

/// Closing line appended by the finalize stage
pub fn closing_for(intent: Option<Intent>) -> &'static str {
    match intent {
        Some(Intent::Emergency) => "⚠️ **Remember:** This AI assistant cannot replace professional medical care. Always consult healthcare providers for medical decisions.",
        Some(Intent::Appointment) => "📅 **Next Steps:** I'll help you with any additional scheduling needs.",
        Some(Intent::MedicalRecords) => "🔒 **Privacy:** Your medical information is secure and access is logged.",
        Some(Intent::Routine) | None => "💡 **How else can I help?** Feel free to ask about appointments, medical records, or general questions.",
    }
}

/// Tunables taken from the configuration
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub emergency_keywords: Vec<String>,
    pub urgency_threshold: u8,
    pub auto_alert: bool,
    pub max_turns: usize,
    /// Base sampling temperature for every model call
    pub temperature: f32,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            emergency_keywords: default_emergency_keywords(),
            urgency_threshold: 7,
            auto_alert: true,
            max_turns: DEFAULT_MAX_TURNS,
            temperature: 0.0,
        }
    }
}

impl GraphSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            emergency_keywords: config.emergency.keywords.clone(),
            urgency_threshold: config.emergency.urgency_threshold,
            auto_alert: config.emergency.auto_alert,
            max_turns: config.memory.max_turns,
            temperature: config.llm.temperature,
        }
    }
}

/// The patient assistant workflow
pub struct CareGraph {
    llm: Arc<dyn ChatModel>,
    classifier: IntentClassifier,
    emergency: EmergencyAgent,
    scheduler: SchedulerAgent,
    records_agent: RecordsAgent,
    routine: RoutineAgent,

    records: RecordStore,
    alerts: Arc<AlertManager>,
    persistence: Option<SessionPersistence>,
    memories: HashMap<String, ConversationMemory>,
    max_turns: usize,
    telemetry: TelemetryCollector,
}

impl CareGraph {
    /// Build the workflow from configuration, seeding the record store on
    /// first run
    pub fn from_config(llm: Arc<dyn ChatModel>, config: &Config) -> Self {
        let records = RecordStore::load_or_seed(config.records_file());
        let alerts = AlertManager::new(Some(config.alert_history_file()));

        let persistence = match SessionPersistence::new(config.session_dir()) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "session persistence disabled");
                None
            }
        };

        Self::with_parts(llm, records, alerts, persistence, GraphSettings::from_config(config))
    }

    pub fn with_parts(
        llm: Arc<dyn ChatModel>,
        records: RecordStore,
        alerts: AlertManager,
        persistence: Option<SessionPersistence>,
        settings: GraphSettings,
    ) -> Self {
        let alerts = Arc::new(alerts);

        Self {
            classifier: IntentClassifier::with_keywords(llm.clone(), settings.emergency_keywords)
                .with_temperature(settings.temperature),
            emergency: EmergencyAgent::new(
                llm.clone(),
                alerts.clone(),
                settings.urgency_threshold,
                settings.auto_alert,
            )
            .with_temperature(settings.temperature),
            scheduler: SchedulerAgent::new(llm.clone()).with_temperature(settings.temperature),
            records_agent: RecordsAgent::new(),
            routine: RoutineAgent::new(llm.clone()).with_temperature(settings.temperature),
            llm,
            records,
            alerts,
            persistence,
            memories: HashMap::new(),
            max_turns: settings.max_turns,
            telemetry: TelemetryCollector::new(),
        }
    }

    /// Run one message through the workflow and return the final state
    pub async fn process_message(
        &mut self,
        message: &str,
        patient_id: Option<&str>,
        context: &str,
    ) -> ConversationState {
        let started = Instant::now();
        let mut state = ConversationState::new(message, patient_id, context);
        info!(patient_id = %state.patient_id, session_id = %state.session_id, "processing message");

        let mut stage = Stage::Classify;
        while !stage.is_terminal() {
            debug!(stage = stage.display_name(), "entering stage");
            let event = self.run_stage(stage, &mut state, started).await;

            let next = match stage.transition(event) {
                Ok(next) => next,
                Err(e) => {
                    warn!(error = %e, "workflow aborted");
                    state.record_error(stage, e.to_string());
                    Stage::Done
                }
            };

            self.telemetry.record(TelemetryEvent::StageTransition {
                from: stage,
                to: next,
                timestamp: Instant::now(),
            });
            stage = next;
        }

        if state.response.trim().is_empty() {
            state.response = EMPTY_RESPONSE_APOLOGY.to_string();
        }

        state
    }

    /// Response text only
    pub async fn respond(&mut self, message: &str, patient_id: Option<&str>, context: &str) -> String {
        self.process_message(message, patient_id, context).await.response
    }

    async fn run_stage(&mut self, stage: Stage, state: &mut ConversationState, started: Instant) -> StageEvent {
        match stage {
            Stage::Classify => self.classify(state).await,
            Stage::Emergency | Stage::Scheduling | Stage::Records | Stage::Routine => {
                self.dispatch(stage, state).await;
                StageEvent::HandlerComplete
            }
            Stage::Finalize => {
                finalize(state);
                StageEvent::Finalized
            }
            Stage::Persist => {
                self.persist(state, started);
                StageEvent::Persisted
            }
            Stage::Done => StageEvent::Persisted,
        }
    }

    async fn classify(&self, state: &mut ConversationState) -> StageEvent {
        match self.classifier.classify(&state.message, &state.context).await {
            Ok(classification) => {
                state.intent = Some(classification.intent);
                state.confidence = classification.confidence;
                state.urgency = classification.urgency;
                state.reasoning = classification.reasoning;
                StageEvent::Routed(classification.intent)
            }
            Err(e) => {
                warn!(error = %e, "intent classification failed");
                state.intent = None;
                state.record_error(Stage::Classify, e.to_string());
                StageEvent::ClassifyFailed
            }
        }
    }

    async fn dispatch(&self, stage: Stage, state: &mut ConversationState) {
        let result = match stage {
            Stage::Emergency => self.emergency.handle(state, &self.records).await,
            Stage::Scheduling => self.scheduler.handle(state, &self.records).await,
            Stage::Records => self.records_agent.handle(state, &self.records),
            _ => self.routine.handle(state, &self.records).await,
        };

        if let Err(e) = result {
            warn!(stage = stage.name(), error = %e, "handler failed, using fallback reply");
            state.record_error(stage, e.to_string());
            state.used_fallback = true;
            match stage {
                Stage::Emergency => EmergencyAgent::apply_fallback(state),
                Stage::Scheduling => SchedulerAgent::apply_fallback(state),
                Stage::Records => RecordsAgent::apply_fallback(state),
                _ => RoutineAgent::apply_fallback(state),
            }
        }

        if let HandlerOutcome::Emergency {
            alert_id: Some(alert_id),
            alert_sent,
            ..
        } = &state.outcome
        {
            self.telemetry.record(TelemetryEvent::AlertRaised {
                alert_id: alert_id.clone(),
                delivered: *alert_sent,
                timestamp: Instant::now(),
            });
        }
    }

    fn memory_for(&mut self, patient_id: &str) -> &mut ConversationMemory {
        let max_turns = self.max_turns;
        let persistence = self.persistence.as_ref();

        self.memories.entry(patient_id.to_string()).or_insert_with(|| {
            let mut memory = ConversationMemory::with_capacity(patient_id, max_turns);
            if let Some(persistence) = persistence {
                match persistence.load(patient_id) {
                    Ok(Some(export)) => {
                        debug!(patient_id, "restored conversation from disk");
                        memory.restore(export);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(patient_id, error = %e, "ignoring unreadable session file"),
                }
            }
            memory
        })
    }

    fn persist(&mut self, state: &mut ConversationState, started: Instant) {
        let mut metadata = Map::new();
        metadata.insert(
            "last_intent".to_string(),
            state.intent.map(|i| json!(i.as_str())).unwrap_or(Value::Null),
        );
        metadata.insert("confidence".to_string(), json!(state.confidence));
        metadata.insert("urgency".to_string(), json!(state.urgency));
        metadata.insert("timestamp".to_string(), json!(state.timestamp));
        metadata.insert("session_id".to_string(), json!(state.session_id));

        let export = {
            let memory = self.memory_for(&state.patient_id);
            memory.save_interaction(&state.message, &state.response, metadata);
            memory.export()
        };
        state.memory_updated = true;

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save(&export) {
                warn!(patient_id = %state.patient_id, error = %e, "failed to save session");
                state.record_error(Stage::Persist, e.to_string());
            }
        }

        self.telemetry.record_interaction(
            state.intent,
            started.elapsed(),
            state.used_fallback,
            state.errors.len(),
        );

        info!(
            patient_id = %state.patient_id,
            intent = state.intent.map(|i| i.as_str()).unwrap_or("none"),
            "conversation updated"
        );
    }

    /// Stored turns for a patient, restoring from disk on first use
    pub fn conversation_history(&mut self, patient_id: &str) -> Vec<Turn> {
        self.memory_for(patient_id).history()
    }

    /// Forget a patient's conversation in memory and on disk
    pub fn clear_patient(&mut self, patient_id: &str) -> Result<()> {
        if let Some(memory) = self.memories.get_mut(patient_id) {
            memory.clear();
        }
        if let Some(persistence) = &self.persistence {
            persistence
                .delete(patient_id)
                .map_err(|e| CareError::Session(format!("{:#}", e)))?;
        }
        info!(patient_id, "cleared conversation");
        Ok(())
    }

    /// Patients with a stored session file
    pub fn known_sessions(&self) -> Vec<String> {
        match &self.persistence {
            Some(persistence) => persistence.list().unwrap_or_else(|e| {
                warn!(error = %e, "failed to list sessions");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut RecordStore {
        &mut self.records
    }

    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn model_name(&self) -> &str {
        self.llm.name()
    }
}

/// Guarantee a reply, append the intent closing and stamp the time
pub fn finalize(state: &mut ConversationState) {
    if state.response.trim().is_empty() {
        state.response = EMPTY_RESPONSE_APOLOGY.to_string();
    }

    state.response = format!("{}\n\n{}", state.response, closing_for(state.intent));
    state.timestamp = Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{Alert, AlertSink};
    use crate::llm::ScriptedModel;
    use crate::records::{sample_data, ClinicData};
    use tempfile::TempDir;

    struct QuietSink;

    impl AlertSink for QuietSink {
        fn deliver(&self, _alert: &Alert) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "quiet"
        }
    }

    fn graph(model: ScriptedModel, data: ClinicData, dir: Option<&TempDir>) -> CareGraph {
        let persistence = dir.map(|d| SessionPersistence::new(d.path().join("sessions")).unwrap());
        let alerts = AlertManager::with_sink(
            Box::new(QuietSink),
            dir.map(|d| d.path().join("alerts.json")),
        );
        CareGraph::with_parts(
            Arc::new(model),
            RecordStore::in_memory(data),
            alerts,
            persistence,
            GraphSettings::default(),
        )
    }

    #[test]
    fn test_finalize_appends_closing() {
        let mut state = ConversationState::new("hi", None, "");
        state.intent = Some(Intent::Appointment);
        state.response = "Booked.".to_string();
        finalize(&mut state);
        assert!(state.response.starts_with("Booked.\n\n📅 **Next Steps:**"));
        assert!(state.timestamp.is_some());
    }

    #[test]
    fn test_finalize_empty_response() {
        let mut state = ConversationState::new("hi", None, "");
        finalize(&mut state);
        assert!(state.response.starts_with(EMPTY_RESPONSE_APOLOGY));
        assert!(state.response.contains("How else can I help?"));
    }

    #[test]
    fn test_closings() {
        assert!(closing_for(Some(Intent::Emergency)).contains("cannot replace professional medical care"));
        assert!(closing_for(Some(Intent::MedicalRecords)).contains("access is logged"));
        assert_eq!(closing_for(Some(Intent::Routine)), closing_for(None));
    }

    #[tokio::test]
    async fn test_routine_message_flow() {
        let mut graph = graph(ScriptedModel::always("INTENT: routine\nCONFIDENCE: 9"), sample_data(), None);
        let state = graph.process_message("What are your hours?", Some("patient-001"), "").await;

        assert_eq!(state.intent, Some(Intent::Routine));
        assert!(state.response.contains("Monday-Friday: 8:00 AM - 6:00 PM"));
        assert!(state.response.ends_with(closing_for(Some(Intent::Routine))));
        assert!(state.memory_updated);
        assert!(!state.has_errors());
        assert_eq!(graph.conversation_history("patient-001").len(), 2);
    }

    #[tokio::test]
    async fn test_emergency_keyword_flow_raises_alert() {
        let temp = TempDir::new().unwrap();
        let mut graph = graph(ScriptedModel::always("Call 911 now."), sample_data(), Some(&temp));
        let state = graph.process_message("I have chest pain", Some("patient-001"), "").await;

        assert_eq!(state.intent, Some(Intent::Emergency));
        assert_eq!(state.urgency, 10);
        assert!(state.response.contains("IMMEDIATE EMERGENCY"));
        assert!(state.response.contains("Call 911 now."));
        assert_eq!(graph.alerts().recent_alerts(5).len(), 1);
        assert_eq!(graph.telemetry().get_stats().alerts_raised, 1);
    }

    #[tokio::test]
    async fn test_unknown_intent_takes_error_branch() {
        let mut graph = graph(ScriptedModel::always("INTENT: billing"), sample_data(), None);
        let state = graph.process_message("How much do I owe?", None, "").await;

        assert!(state.intent.is_none());
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].stage, Stage::Classify);
        assert!(state.response.starts_with(EMPTY_RESPONSE_APOLOGY));
        assert_eq!(graph.telemetry().get_stats().unclassified, 1);
    }

    #[tokio::test]
    async fn test_handler_failure_uses_stage_fallback() {
        let mut graph = graph(
            ScriptedModel::always("INTENT: medical_records"),
            ClinicData::default(),
            None,
        );
        let state = graph.process_message("show me my chart", Some("patient-001"), "").await;

        assert_eq!(state.intent, Some(Intent::MedicalRecords));
        assert!(state.used_fallback);
        assert_eq!(state.errors[0].stage, Stage::Records);
        assert!(state.response.starts_with("I'm having trouble accessing medical records."));
        assert!(state.response.contains("access is logged"));
    }

    #[tokio::test]
    async fn test_offline_model_still_answers() {
        let mut graph = graph(ScriptedModel::failing(), sample_data(), None);
        let state = graph.process_message("I'd like to book a visit", Some("patient-002"), "").await;

        assert_eq!(state.intent, Some(Intent::Appointment));
        assert!(state.response.contains("Here are the available time slots"));
        assert!(state.response.contains("Next Steps"));
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let temp = TempDir::new().unwrap();
        {
            let mut graph = graph(ScriptedModel::failing(), sample_data(), Some(&temp));
            graph.respond("What are your hours?", Some("patient-003"), "").await;
        }

        let mut graph = graph(ScriptedModel::failing(), sample_data(), Some(&temp));
        let history = graph.conversation_history("patient-003");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "What are your hours?");
        assert_eq!(graph.known_sessions(), vec!["patient-003"]);

        graph.clear_patient("patient-003").unwrap();
        assert!(graph.conversation_history("patient-003").is_empty());
        assert!(graph.known_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_patients_are_isolated() {
        let mut graph = graph(ScriptedModel::failing(), sample_data(), None);
        graph.respond("hours?", Some("patient-001"), "").await;
        graph.respond("hours?", Some("patient-002"), "").await;
        graph.respond("insurance?", Some("patient-002"), "").await;

        assert_eq!(graph.conversation_history("patient-001").len(), 2);
        assert_eq!(graph.conversation_history("patient-002").len(), 4);
    }

    #[tokio::test]
    async fn test_similar_ids_do_not_share_history() {
        let temp = TempDir::new().unwrap();
        {
            let mut graph = graph(ScriptedModel::failing(), sample_data(), Some(&temp));
            graph.respond("my secret question about insurance", Some("john smith"), "").await;
            graph.respond("What are your hours?", Some("john_smith"), "").await;
        }

        let mut graph = graph(ScriptedModel::failing(), sample_data(), Some(&temp));
        let spaced = graph.conversation_history("john smith");
        let underscored = graph.conversation_history("john_smith");
        assert_eq!(spaced.len(), 2);
        assert_eq!(spaced[0].content, "my secret question about insurance");
        assert_eq!(underscored.len(), 2);
        assert_eq!(underscored[0].content, "What are your hours?");
        assert!(graph.conversation_history("john.smith").is_empty());
        assert_eq!(graph.known_sessions(), vec!["john smith", "john_smith"]);
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_response() {
        let temp = TempDir::new().unwrap();
        let not_a_dir = temp.path().join("sessions");
        std::fs::write(&not_a_dir, "plain file").unwrap();

        let mut graph = CareGraph::with_parts(
            Arc::new(ScriptedModel::always("INTENT: routine\nCONFIDENCE: 9")),
            RecordStore::in_memory(sample_data()),
            AlertManager::new(None),
            Some(SessionPersistence::new(not_a_dir.clone()).unwrap()),
            GraphSettings::default(),
        );
        let state = graph.process_message("What are your hours?", Some("patient-001"), "").await;

        assert!(state.response.contains("Monday-Friday: 8:00 AM - 6:00 PM"));
        assert!(state.response.ends_with(closing_for(Some(Intent::Routine))));
        assert_eq!(state.errors.len(), 1);
        assert_eq!(state.errors[0].stage, Stage::Persist);
        assert!(state.memory_updated);
        assert_eq!(graph.conversation_history("patient-001").len(), 2);

        let last = graph.telemetry().recent_events(1);
        assert!(matches!(
            last[0],
            TelemetryEvent::StageTransition { from: Stage::Persist, to: Stage::Done, .. }
        ));
        assert_eq!(graph.telemetry().get_stats().errors, 1);
    }

    #[tokio::test]
    async fn test_emergency_fallback_when_records_unavailable() {
        let mut graph = graph(ScriptedModel::failing(), ClinicData::default(), None);
        let state = graph.process_message("I have chest pain", Some("patient-001"), "").await;

        assert_eq!(state.intent, Some(Intent::Emergency));
        assert!(state.used_fallback);
        assert_eq!(state.errors[0].stage, Stage::Emergency);
        assert_eq!(state.urgency, 10);
        assert!(state.response.starts_with("🚨 EMERGENCY PROTOCOL ACTIVATED 🚨"));
        assert!(state.response.contains("cannot replace professional medical care"));
        assert!(matches!(
            state.outcome,
            HandlerOutcome::Emergency { alert_id: None, alert_sent: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_routine_fallback_when_records_unavailable() {
        let mut graph = graph(ScriptedModel::failing(), ClinicData::default(), None);
        let state = graph.process_message("What are your hours?", None, "").await;

        assert_eq!(state.intent, Some(Intent::Routine));
        assert!(state.used_fallback);
        assert_eq!(state.errors[0].stage, Stage::Routine);
        assert!(state.response.starts_with("I apologize, but I'm having trouble accessing our information system"));
        assert_eq!(graph.telemetry().get_stats().fallbacks, 1);
    }
}
