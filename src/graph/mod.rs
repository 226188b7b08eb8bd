//! Message workflow: the stage machine and its orchestrator

pub mod orchestrator;
pub mod state;

pub use orchestrator::{CareGraph, GraphSettings};
pub use state::{ConversationState, HandlerOutcome, Intent, Stage, StageError, StageEvent};
