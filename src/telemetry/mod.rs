//! Interaction telemetry
//!
//! In-process counters for handled messages, shown by the REPL `/stats`
//! command. Nothing is exported.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::graph::state::{Intent, Stage};

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// The workflow moved between stages
    StageTransition {
        from: Stage,
        to: Stage,
        timestamp: Instant,
    },

    /// A message completed the workflow
    InteractionCompleted {
        intent: Option<Intent>,
        duration_ms: u64,
        used_fallback: bool,
        errors: usize,
        timestamp: Instant,
    },

    /// An emergency alert was raised
    AlertRaised {
        alert_id: String,
        delivered: bool,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub interactions: usize,
    pub per_intent: HashMap<Intent, usize>,
    /// Interactions whose intent could not be determined
    pub unclassified: usize,
    pub fallbacks: usize,
    pub errors: usize,
    pub alerts_raised: usize,
    pub stage_transitions: usize,
    pub total_duration_ms: u64,
}

impl TelemetryStats {
    /// Mean handling time per interaction
    pub fn average_duration_ms(&self) -> f64 {
        if self.interactions == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.interactions as f64
        }
    }

    pub fn intent_count(&self, intent: Intent) -> usize {
        self.per_intent.get(&intent).copied().unwrap_or(0)
    }
}

/// Events kept for inspection; counters in [`TelemetryStats`] are unbounded
pub const MAX_EVENTS: usize = 500;

/// Telemetry collector, cheap to clone and share
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<VecDeque<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        if let Ok(mut stats) = self.stats.lock() {
            match &event {
                TelemetryEvent::StageTransition { .. } => {
                    stats.stage_transitions += 1;
                }
                TelemetryEvent::InteractionCompleted {
                    intent,
                    duration_ms,
                    used_fallback,
                    errors,
                    ..
                } => {
                    stats.interactions += 1;
                    match intent {
                        Some(intent) => *stats.per_intent.entry(*intent).or_insert(0) += 1,
                        None => stats.unclassified += 1,
                    }
                    if *used_fallback {
                        stats.fallbacks += 1;
                    }
                    stats.errors += errors;
                    stats.total_duration_ms += duration_ms;
                }
                TelemetryEvent::AlertRaised { .. } => {
                    stats.alerts_raised += 1;
                }
            }
        }

        if let Ok(mut events) = self.events.lock() {
            if events.len() >= MAX_EVENTS {
                events.pop_front();
            }
            events.push_back(event);
        }
    }

    /// Convenience for the common completion event
    pub fn record_interaction(&self, intent: Option<Intent>, duration: Duration, used_fallback: bool, errors: usize) {
        self.record(TelemetryEvent::InteractionCompleted {
            intent,
            duration_ms: duration.as_millis() as u64,
            used_fallback,
            errors,
            timestamp: Instant::now(),
        });
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| {
                let start = events.len().saturating_sub(n);
                events.iter().skip(start).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Share of interactions answered without a stage fallback
    pub fn success_rate(&self) -> f64 {
        let stats = self.get_stats();
        if stats.interactions == 0 {
            1.0
        } else {
            (stats.interactions - stats.fallbacks) as f64 / stats.interactions as f64
        }
    }

    /// Label/value rows for display
    pub fn summary_rows(&self) -> Vec<(String, String)> {
        let stats = self.get_stats();
        let mut rows = vec![
            ("Uptime".to_string(), format!("{}s", self.elapsed().as_secs())),
            ("Interactions".to_string(), stats.interactions.to_string()),
        ];
        for intent in Intent::ALL {
            rows.push((format!("  {}", intent), stats.intent_count(intent).to_string()));
        }
        rows.push(("  unclassified".to_string(), stats.unclassified.to_string()));
        rows.push(("Fallbacks".to_string(), stats.fallbacks.to_string()));
        rows.push(("Stage errors".to_string(), stats.errors.to_string()));
        rows.push(("Alerts raised".to_string(), stats.alerts_raised.to_string()));
        rows.push((
            "Avg handling time".to_string(),
            format!("{:.0} ms", stats.average_duration_ms()),
        ));
        rows.push((
            "Success rate".to_string(),
            format!("{:.1}%", self.success_rate() * 100.0),
        ));
        rows
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
