//! careline - patient-facing clinic assistant
//!
//! Every patient message is classified into one of four intents and routed
//! to a specialised handler:
//!
//! - **emergency**: triage guidance, 911 instructions and care-team alerts
//! - **appointment**: booking, rescheduling, cancellation and availability
//! - **medical_records**: medications, allergies, history and test results
//! - **routine**: office hours, insurance, refills and other FAQs
//!
//! The workflow lives in [`graph`]; handlers in [`agents`]; clinic data in
//! [`records`]; per-patient conversation memory in [`memory`].

pub mod agents;
pub mod alerts;
pub mod cli;
pub mod doctor;
pub mod errors;
pub mod graph;
pub mod llm;
pub mod logger;
pub mod memory;
pub mod records;
pub mod repl;
pub mod telemetry;

pub use errors::{CareError, Result};
pub use graph::{CareGraph, ConversationState, Intent};
