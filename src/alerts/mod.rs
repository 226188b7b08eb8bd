//! Emergency alerting
//!
//! Alerts are handed to an [`AlertSink`] and appended to a JSON history
//! file. Delivery is best-effort: a failing sink or history write is
//! reported in the [`AlertReceipt`], never as an error to the caller.

pub mod sink;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::Result;

pub use sink::{AlertSink, LogSink};

/// Entries kept in the history file
pub const MAX_ALERT_HISTORY: usize = 100;

/// Who is notified for emergency alerts
pub const DEFAULT_CONTACTS: &[&str] = &["On-call physician", "Nursing station"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Emergency,
    Routine,
}

/// One raised alert, as stored in the history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub urgency: u8,
    pub category: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Local>,
    pub delivered: bool,
}

/// Result of raising an alert
#[derive(Debug, Clone, PartialEq)]
pub struct AlertReceipt {
    pub sent: bool,
    pub alert_id: String,
    pub delivered: bool,
    pub timestamp: DateTime<Local>,
    pub contacts_notified: Vec<String>,
}

/// Raises alerts and keeps their history
pub struct AlertManager {
    sink: Box<dyn AlertSink>,
    history_file: Option<PathBuf>,
    contacts: Vec<String>,
}

impl AlertManager {
    /// Manager logging through [`LogSink`] and recording to `history_file`
    pub fn new(history_file: Option<PathBuf>) -> Self {
        Self::with_sink(Box::new(LogSink), history_file)
    }

    pub fn with_sink(sink: Box<dyn AlertSink>, history_file: Option<PathBuf>) -> Self {
        Self {
            sink,
            history_file,
            contacts: DEFAULT_CONTACTS.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Raise an emergency alert for a patient
    pub fn send_emergency_alert(&self, patient_info: &str, symptoms: &str, urgency: u8) -> AlertReceipt {
        let now = Local::now();
        let id = format!("EMRG_{}", now.timestamp());
        let urgency = urgency.min(10);

        let body = format!(
            "EMERGENCY ALERT {id}\n\
             Time: {time}\n\
             Urgency: {urgency}/10\n\n\
             PATIENT:\n{patient_info}\n\n\
             REPORTED SYMPTOMS:\n{symptoms}\n\n\
             Immediate follow-up required.",
            time = now.format("%Y-%m-%d %H:%M:%S"),
        );

        let alert = Alert {
            id,
            kind: AlertKind::Emergency,
            urgency,
            category: "emergency".to_string(),
            subject: format!("EMERGENCY: urgency {}/10", urgency),
            body,
            timestamp: now,
            delivered: false,
        };

        self.raise(alert, self.contacts.clone())
    }

    /// Raise a non-urgent notification (records updates, follow-ups)
    pub fn send_routine_alert(&self, message: &str, category: &str) -> AlertReceipt {
        let now = Local::now();
        let alert = Alert {
            id: format!("RTN_{}", now.timestamp()),
            kind: AlertKind::Routine,
            urgency: 0,
            category: category.to_string(),
            subject: format!("Notification: {}", category),
            body: message.to_string(),
            timestamp: now,
            delivered: false,
        };

        self.raise(alert, Vec::new())
    }

    fn raise(&self, mut alert: Alert, contacts: Vec<String>) -> AlertReceipt {
        alert.delivered = match self.sink.deliver(&alert) {
            Ok(()) => true,
            Err(e) => {
                warn!(alert_id = %alert.id, sink = self.sink.name(), error = %e, "alert delivery failed");
                false
            }
        };

        let recorded = match self.record(&alert) {
            Ok(()) => true,
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "failed to record alert history");
                false
            }
        };

        info!(alert_id = %alert.id, delivered = alert.delivered, "alert raised");

        AlertReceipt {
            sent: alert.delivered || recorded,
            alert_id: alert.id,
            delivered: alert.delivered,
            timestamp: alert.timestamp,
            contacts_notified: if alert.delivered { contacts } else { Vec::new() },
        }
    }

    fn record(&self, alert: &Alert) -> Result<()> {
        let Some(path) = &self.history_file else {
            return Ok(());
        };

        let mut history = read_history(path);
        history.push(alert.clone());
        if history.len() > MAX_ALERT_HISTORY {
            let excess = history.len() - MAX_ALERT_HISTORY;
            history.drain(..excess);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&history)?)?;
        Ok(())
    }

    /// Most recent alerts, newest last
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        let Some(path) = &self.history_file else {
            return Vec::new();
        };

        let history = read_history(path);
        let skip = history.len().saturating_sub(limit);
        history.into_iter().skip(skip).collect()
    }
}

/// Missing or unreadable history counts as empty
fn read_history(path: &Path) -> Vec<Alert> {
    fs::read_to_string(path)
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}
