//! CLI module for careline
//!
//! Handles command-line argument parsing and configuration management.

pub mod config;
pub mod args;

pub use config::{Config, Environment};
pub use args::{Args, Commands, Verbosity};
