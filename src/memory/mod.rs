//! Conversation memory
//!
//! Components:
//! - Conversation: bounded per-patient turn history and medical context
//! - Persistence: per-patient JSON session files

pub mod conversation;
pub mod persistence;

pub use conversation::{ConversationMemory, SessionExport, Speaker, Turn, DEFAULT_MAX_TURNS};
pub use persistence::SessionPersistence;
