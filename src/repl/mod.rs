//! Interactive chat REPL
//!
//! Reads patient messages, runs them through the [`CareGraph`] and prints
//! the replies. Lines starting with `/` are handled as commands.

pub mod commands;
pub mod display;
pub mod input;
pub mod session;

use anyhow::Result;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

use crate::graph::CareGraph;
use crate::repl::commands::{is_command, CommandHandler};
pub use crate::repl::display::DisplayManager;
use crate::repl::input::{InputEvent, InputHandler};
pub use crate::repl::session::{ChatSession, ExchangeRecord};

/// REPL session coordinator
pub struct ReplSession {
    input: InputHandler,
    session: ChatSession,
    display: DisplayManager,
    verbose: bool,
}

impl ReplSession {
    pub fn new(patient_id: Option<String>, history_file: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let mut input = match history_file {
            Some(path) => InputHandler::with_history(path)?,
            None => InputHandler::new()?,
        };
        input.set_patient(patient_id.as_deref());

        Ok(Self {
            input,
            session: ChatSession::new(patient_id),
            display: DisplayManager::new(),
            verbose,
        })
    }

    /// Run until `/exit` or end of input
    pub async fn run(&mut self, graph: &mut CareGraph, version: &str) -> Result<()> {
        self.display
            .show_banner(version, graph.model_name(), self.session.patient_id());

        loop {
            let line = match self.input.read_line()? {
                InputEvent::Line(line) => line,
                InputEvent::Interrupted => {
                    self.display.show_info("Use /exit or Ctrl-D to quit.");
                    continue;
                }
                InputEvent::Eof => break,
            };

            if !self.handle_line(&line, graph).await? {
                break;
            }
        }

        self.input.save_history()?;
        Ok(())
    }

    /// Handle one line. Returns `false` when the session should end.
    pub async fn handle_line(&mut self, line: &str, graph: &mut CareGraph) -> Result<bool> {
        if line.trim().is_empty() {
            return Ok(true);
        }

        if is_command(line) {
            let command = commands::parse(line);
            debug!(?command, "repl command");
            let keep_going = CommandHandler::execute(command, &mut self.session, graph, &self.display)?;
            self.input.set_patient(self.session.patient_id());
            return Ok(keep_going);
        }

        let context = self.session.build_context();
        let patient_id = self.session.patient_id().map(str::to_string);

        self.display.start_thinking();
        let started = Instant::now();
        let state = graph
            .process_message(line, patient_id.as_deref(), &context)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.display.show_reply(&state, duration_ms, self.verbose);
        self.session
            .record(ExchangeRecord::from_state(&state, duration_ms));

        Ok(true)
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }
}
