//! Slash commands available inside the chat REPL

use anyhow::Result;
use colored::*;

use crate::graph::CareGraph;
use crate::repl::display::DisplayManager;
use crate::repl::session::ChatSession;

const DEFAULT_HISTORY_LIMIT: usize = 10;
const DEFAULT_ALERT_LIMIT: usize = 10;

/// REPL command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// Switch patient; `None` returns to anonymous
    Patient { id: Option<String> },
    WhoAmI,
    History { limit: Option<usize> },
    Clear,
    Alerts { limit: Option<usize> },
    Stats,
    Exit,
    Unknown { input: String },
}

/// Check whether input is a slash command
pub fn is_command(input: &str) -> bool {
    input.trim_start().starts_with('/')
}

/// Parse input into a command
pub fn parse(input: &str) -> Command {
    let trimmed = input.trim();
    let unknown = || Command::Unknown {
        input: trimmed.to_string(),
    };

    let Some(body) = trimmed.strip_prefix('/') else {
        return unknown();
    };
    let parts: Vec<&str> = body.split_whitespace().collect();
    let Some(name) = parts.first() else {
        return unknown();
    };

    match name.to_lowercase().as_str() {
        "help" | "h" | "?" => Command::Help,
        "patient" | "p" => Command::Patient {
            id: parts
                .get(1)
                .filter(|id| !id.eq_ignore_ascii_case("none"))
                .map(|id| id.to_string()),
        },
        "whoami" => Command::WhoAmI,
        "history" => Command::History {
            limit: parts.get(1).and_then(|s| s.parse().ok()),
        },
        "clear" => Command::Clear,
        "alerts" => Command::Alerts {
            limit: parts.get(1).and_then(|s| s.parse().ok()),
        },
        "stats" => Command::Stats,
        "exit" | "quit" | "q" => Command::Exit,
        _ => unknown(),
    }
}

/// Executes commands against the session and workflow
pub struct CommandHandler;

impl CommandHandler {
    /// Execute a command. Returns `false` when the REPL should exit.
    pub fn execute(
        command: Command,
        session: &mut ChatSession,
        graph: &mut CareGraph,
        display: &DisplayManager,
    ) -> Result<bool> {
        match command {
            Command::Help => show_help(),
            Command::Exit => {
                println!("{}", "Take care. Goodbye!".green());
                return Ok(false);
            }
            Command::Patient { id: None } => {
                session.set_patient(None);
                display.show_info("Now chatting anonymously.");
            }
            Command::Patient { id: Some(id) } => match graph.records().patient(&id) {
                Some(patient) => {
                    display.show_info(&format!("Now chatting as {} ({}).", patient.name, patient.id));
                    session.set_patient(Some(id));
                }
                None => display.show_warning(&format!("No patient with id '{}'.", id)),
            },
            Command::WhoAmI => match session.patient_id() {
                Some(id) => {
                    let name = graph
                        .records()
                        .patient(id)
                        .map(|p| p.name.clone())
                        .unwrap_or_else(|| "unknown patient".to_string());
                    display.show_info(&format!("{} ({})", id, name));
                }
                None => display.show_info("Anonymous session (use /patient <id> to identify)."),
            },
            Command::History { limit } => match session.patient_id() {
                Some(id) => {
                    let id = id.to_string();
                    let history = graph.conversation_history(&id);
                    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
                    let start = history.len().saturating_sub(limit);
                    display.show_history(&id, &history[start..]);
                }
                None => display.show_warning("Select a patient first with /patient <id>."),
            },
            Command::Clear => {
                let id = session
                    .patient_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| crate::graph::state::DEFAULT_PATIENT_ID.to_string());
                graph.clear_patient(&id)?;
                session.clear();
                display.show_info(&format!("Conversation for {} cleared.", id));
            }
            Command::Alerts { limit } => {
                let alerts = graph
                    .alerts()
                    .recent_alerts(limit.unwrap_or(DEFAULT_ALERT_LIMIT));
                display.show_alerts(&alerts);
            }
            Command::Stats => {
                let mut rows = graph.telemetry().summary_rows();
                rows.push(("Session messages".to_string(), session.exchange_count().to_string()));
                rows.push(("Session time".to_string(), format!("{}s", session.elapsed_secs())));
                display.show_table("Session statistics:", &rows);
            }
            Command::Unknown { input } => {
                println!("{}", format!("Unknown command: {}", input).red());
                println!("Type {} for available commands", "/help".cyan());
            }
        }
        Ok(true)
    }
}

fn show_help() {
    println!("\n{}", "Available Commands:".bold().cyan());
    println!("{}", "=".repeat(60).cyan());

    let commands = [
        ("/help, /h", "Show this help message"),
        ("/patient <id|none>", "Chat as a patient, or anonymously"),
        ("/whoami", "Show the active patient"),
        ("/history [n]", "Show the last n stored turns (default: 10)"),
        ("/clear", "Forget the active patient's conversation"),
        ("/alerts [n]", "Show recent alerts"),
        ("/stats", "Show session statistics"),
        ("/exit, /quit, /q", "Exit"),
    ];

    for (cmd, desc) in commands {
        println!("  {:<22} {}", cmd.green(), desc);
    }

    println!("\n{}", "Usage:".bold());
    println!("  - Type your message directly (no / prefix)");
    println!("  - Press {} or {} to exit", "Ctrl-D".cyan(), "/exit".cyan());
    println!();
}
