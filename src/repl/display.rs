//! Terminal output for the chat REPL

use colored::*;
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

use crate::alerts::{Alert, AlertKind};
use crate::graph::state::{ConversationState, HandlerOutcome};
use crate::memory::{Speaker, Turn};

const RULE_WIDTH: usize = 60;

/// Display manager for REPL UI
pub struct DisplayManager {
    spinner: Option<ProgressBar>,
    tick_interval: Duration,
}

impl DisplayManager {
    pub fn new() -> Self {
        DisplayManager {
            spinner: None,
            tick_interval: Duration::from_millis(100),
        }
    }

    pub fn show_banner(&self, version: &str, model: &str, patient_id: Option<&str>) {
        let rule = "=".repeat(64);
        println!("\n{}", rule.cyan());
        println!("{}", format!("  careline {} - clinic assistant", version).bold().cyan());
        println!(
            "{}",
            format!(
                "  Model: {} | Patient: {}",
                model,
                patient_id.unwrap_or("anonymous")
            )
            .dimmed()
        );
        println!("{}\n", rule.cyan());
        println!(
            "{}",
            "In a medical emergency call 911 or go to the nearest emergency room.".red()
        );
        println!(
            "Type your message (or {} for commands, {} to quit)\n",
            "/help".green(),
            "/exit".green()
        );
    }

    /// Spinner shown while a message is processed
    pub fn start_thinking(&mut self) {
        self.finish_current();

        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.set_message("Thinking...");
        pb.enable_steady_tick(self.tick_interval);

        self.spinner = Some(pb);
    }

    pub fn finish_current(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }

    pub fn is_busy(&self) -> bool {
        self.spinner.is_some()
    }

    /// Print the reply, with routing details when `verbose`
    pub fn show_reply(&mut self, state: &ConversationState, duration_ms: u64, verbose: bool) {
        self.finish_current();

        println!("\n{}\n", state.response);

        if verbose {
            let intent = state.intent.map(|i| i.as_str()).unwrap_or("unclassified");
            println!(
                "{}",
                format!(
                    "intent: {} | confidence: {} | urgency: {} | {}ms",
                    intent, state.confidence, state.urgency, duration_ms
                )
                .dimmed()
            );
            if let HandlerOutcome::Emergency {
                alert_id: Some(id), ..
            } = &state.outcome
            {
                println!("{}", format!("alert: {}", id).dimmed());
            }
            for error in &state.errors {
                println!("{} {}", "stage error:".yellow(), error);
            }
            println!();
        }
    }

    pub fn show_history(&self, patient_id: &str, turns: &[Turn]) {
        if turns.is_empty() {
            println!("{}", format!("No conversation history for {}.", patient_id).yellow());
            return;
        }

        self.show_section(&format!("History for {} (last {}):", patient_id, turns.len()));
        for turn in turns {
            let who = match turn.speaker {
                Speaker::Patient => turn.speaker.label().green(),
                Speaker::Assistant => turn.speaker.label().cyan(),
            };
            println!(
                "  {} {}: {}",
                turn.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                who,
                first_line(&turn.content)
            );
        }
        println!();
    }

    pub fn show_alerts(&self, alerts: &[Alert]) {
        if alerts.is_empty() {
            println!("{}", "No alerts raised.".yellow());
            return;
        }

        self.show_section(&format!("Recent alerts ({}):", alerts.len()));
        for alert in alerts {
            let kind = match alert.kind {
                AlertKind::Emergency => "EMERGENCY".red().bold(),
                AlertKind::Routine => "routine".normal(),
            };
            let status = if alert.delivered { "✓".green() } else { "✗".red() };
            println!(
                "  {} {} {} {} {}",
                status,
                alert.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                kind,
                alert.id.cyan(),
                alert.subject
            );
        }
        println!();
    }

    /// Two-column table of label/value rows
    pub fn show_table(&self, title: &str, rows: &[(String, String)]) {
        self.show_section(title);
        for (label, value) in rows {
            println!("  {:<22} {}", label.green(), value);
        }
        println!();
    }

    pub fn show_error(&self, error: &str) {
        println!("{} {}", "Error:".red().bold(), error.red());
    }

    pub fn show_warning(&self, warning: &str) {
        println!("{} {}", "Warning:".yellow().bold(), warning.yellow());
    }

    pub fn show_info(&self, info: &str) {
        println!("{} {}", "Info:".cyan(), info);
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), cursor::MoveTo(0, 0))
    }

    pub fn show_section(&self, title: &str) {
        println!("\n{}", title.bold().cyan());
        println!("{}", "-".repeat(RULE_WIDTH).cyan());
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

/// First line of a possibly multi-line reply, marked when truncated
fn first_line(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or("");
    if lines.next().is_some() {
        format!("{} …", first)
    } else {
        first.to_string()
    }
}
