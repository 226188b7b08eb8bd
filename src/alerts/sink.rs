//! Alert delivery targets

use tracing::{error, info};

use crate::alerts::{Alert, AlertKind};
use crate::errors::Result;

/// Where raised alerts go
pub trait AlertSink: Send + Sync {
    fn deliver(&self, alert: &Alert) -> Result<()>;

    fn name(&self) -> &str;
}

/// Writes alerts to the tracing log; emergencies at `error` level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn deliver(&self, alert: &Alert) -> Result<()> {
        match alert.kind {
            AlertKind::Emergency => error!(
                alert_id = %alert.id,
                urgency = alert.urgency,
                subject = %alert.subject,
                "{}",
                alert.body
            ),
            AlertKind::Routine => info!(
                alert_id = %alert.id,
                category = %alert.category,
                "{}",
                alert.body
            ),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
